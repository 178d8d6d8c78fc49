use limno::error::Result;
use limno::io::control_io::{read_control_file, RunStyle};
use limno::simulator::Simulator;
use log::{error, info};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: limno <control file>");
        std::process::exit(1);
    }

    if let Err(e) = execute_tasks(&args[1]) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn execute_tasks(control_path: &str) -> Result<()> {
    let control = read_control_file(control_path)?;

    for task in &control.tasks {
        info!("Executing task {}", task.name);
        let mut sim = Simulator::initialize(&control, task)?;

        // A line on stdin requests a clean stop: long runs then end at a
        // step boundary with a final state save
        install_abort_on_stdin(sim.abort_flag());

        match task.style {
            RunStyle::Simu => sim.simulate()?,
            RunStyle::BasinAvg => sim.basin_avg()?,
        }
    }
    Ok(())
}

fn install_abort_on_stdin(abort: std::sync::Arc<std::sync::atomic::AtomicBool>) {
    std::thread::spawn(move || {
        let mut buffer = String::new();
        if std::io::stdin().read_line(&mut buffer).is_ok() {
            abort.store(true, std::sync::atomic::Ordering::Relaxed);
        }
    });
}
