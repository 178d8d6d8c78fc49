use crate::grid::{FlowDir, GeographicProjection, Grid};
use crate::io::control_io::parse_control;
use crate::io::csv_io::read_observed_ts;
use crate::io::tif_grid::{read_float_tif_grid, write_float_tif_grid,
                          write_long_tif_grid};
use crate::simulator::Simulator;
use crate::tid::utils::stamp_to_u64;
use std::fs;
use std::path::PathBuf;

/*
Builds a complete little domain on disk: a 5x5 grid with one channel along
row 2 draining west to a gauge at (0,2), and a reservoir pinned to (2,2)
through its observed flow accumulation. Returns the control file text and
the working directory.
 */
fn build_domain(name: &str, extra_basin: &str, extra_task: &str) -> (String, PathBuf) {
    let dir = PathBuf::from(std::env::temp_dir())
        .join(format!("limno_sim_{}_{}", std::process::id(), name));
    fs::create_dir_all(&dir).unwrap();

    let mut ddm: Grid<i64> = Grid::new(5, 5, 1.0, 0.0, 5.0, -9999, -9999);
    for x in 1..5usize {
        ddm.set(x, 2, FlowDir::East.to_code());
    }
    ddm.set(0, 2, 0);

    let mut fam: Grid<f32> = Grid::new(5, 5, 1.0, 0.0, 5.0, -9999.0, 1.0);
    for x in 0..5usize {
        fam.set(x, 2, (5 - x) as f32);
    }

    let dem: Grid<f32> = Grid::new(5, 5, 1.0, 0.0, 5.0, -9999.0, 1500.0);

    let dem_path = dir.join("dem.tif");
    let ddm_path = dir.join("ddm.tif");
    let fam_path = dir.join("fam.tif");
    write_float_tif_grid(dem_path.to_str().unwrap(), &dem).unwrap();
    write_long_tif_grid(ddm_path.to_str().unwrap(), &ddm).unwrap();
    write_float_tif_grid(fam_path.to_str().unwrap(), &fam).unwrap();

    //The reservoir sits at (2,2); its observed accumulation pins the snap
    //to that cell (3 upstream cells worth of area, in km2)
    let proj = GeographicProjection::new(1.0);
    let (lake_lon, lake_lat) = fam.ref_loc(2, 2);
    let obs_fam_km2 = 3.0 * proj.area_m2(lake_lon, lake_lat) / 1e6;
    let lakes_path = dir.join("lakes.csv");
    fs::write(&lakes_path, format!(
        "name,lat,lon,th_volume,area,klake,obsfam,outputts\n\
         tana,{},{},1.0,100.0,24.0,{},yes\n",
        lake_lat, lake_lon, obs_fam_km2)).unwrap();

    let (gauge_lon, gauge_lat) = fam.ref_loc(0, 2);
    let control = format!(
        "[basic]\n\
         dem = {dem}\n\
         ddm = {ddm}\n\
         fam = {fam}\n\
         [gauge out]\n\
         lat = {glat}\n\
         lon = {glon}\n\
         outputts = yes\n\
         [basin little]\n\
         gauge = out\n\
         lakelistfile = {lakes}\n\
         {extra_basin}\n\
         [task run]\n\
         style = simu\n\
         basin = little\n\
         time_begin = 20200101_0000\n\
         time_end = 20200101_0300\n\
         timestep_hours = 1\n\
         output = {out}\n\
         states = {out}\n\
         {extra_task}\n",
        dem = dem_path.display(), ddm = ddm_path.display(),
        fam = fam_path.display(), glat = gauge_lat, glon = gauge_lon,
        lakes = lakes_path.display(), out = dir.display(),
        extra_basin = extra_basin, extra_task = extra_task);

    (control, dir)
}


/*
Full run of a receding reservoir: the lake snaps onto its cell, the node set
carries it, and the recession shows up in the lake volume output while the
substituted release reaches the outlet two steps later.
 */
#[test]
fn test_simulate_recession() {
    let (control_text, dir) = build_domain("recession", "", "state_time = 20200101_0000");
    let control = parse_control(&control_text).unwrap();
    let mut sim = Simulator::initialize(&control, &control.tasks[0]).unwrap();

    assert!(sim.has_lakes_with_output_ts());
    assert_eq!(sim.lakes().len(), 1);
    assert_eq!(sim.lakes()[0].cell, Some((2, 2)));
    assert!(sim.lakes()[0].enabled);
    assert_eq!(sim.nodes().len(), 5);

    sim.simulate().unwrap();

    //The recession: O1 = S/K, then exponential decay. No forcings, so the
    //storage only moves through the release.
    let o1 = 1e9 / (24.0 * 3600.0);
    let s1 = 1e9 - o1 * 3600.0;
    let o2 = o1 * libm::exp(-1.0 / 24.0);
    let s2 = s1 - o2 * 3600.0;

    let volumes = read_observed_ts(
        dir.join("lake_volumes.csv").to_str().unwrap()).unwrap();
    assert_eq!(volumes.len(), 3);
    let t0 = stamp_to_u64("20200101_0000").unwrap();
    assert!((volumes.value_at(t0) - s1).abs() < 1e-3);
    assert!((volumes.value_at(t0 + 3600) - s2).abs() < 1e-3);

    //The gauge two cells downstream sees the first release on step 3
    let gauge_ts = read_observed_ts(dir.join("ts_out.csv").to_str().unwrap()).unwrap();
    assert_eq!(gauge_ts.len(), 3);
    assert_eq!(gauge_ts.value_at(t0), 0.0);
    assert_eq!(gauge_ts.value_at(t0 + 3600), 0.0);
    assert!((gauge_ts.value_at(t0 + 7200) - o1).abs() < 1e-6);

    //The state checkpoint at the first step exists and carries the
    //post-step storage
    let storage_file = dir.join("lake_storage_20200101_0000.tif");
    assert!(storage_file.exists());
    assert!(dir.join("gauge_relationships_20200101_0000.txt").exists());
    assert!(dir.join("lake_relationships_20200101_0000.txt").exists());
    let storage_grid = read_float_tif_grid(storage_file.to_str().unwrap()).unwrap();
    assert!((storage_grid.get(2, 2) as f64 - s1).abs() < 1e3);
}


/*
A second run starting from the saved states resumes the recession where the
checkpoint left it.
 */
#[test]
fn test_resume_from_states() {
    let (control_text, dir) = build_domain("resume", "", "state_time = 20200101_0000");
    let control = parse_control(&control_text).unwrap();
    let mut sim = Simulator::initialize(&control, &control.tasks[0]).unwrap();
    sim.simulate().unwrap();

    let o1 = 1e9 / (24.0 * 3600.0);
    let s1 = 1e9 - o1 * 3600.0;

    let (resume_text, _dir2) = {
        //Same domain, resuming at the checkpoint stamp
        let mut task_extra = String::from("use_states = yes");
        task_extra.push('\n');
        let text = control_text.replace("state_time = 20200101_0000", &task_extra);
        (text, dir.clone())
    };
    let resume_control = parse_control(&resume_text).unwrap();
    let resumed = Simulator::initialize(&resume_control, &resume_control.tasks[0]).unwrap();

    //Loaded storage matches the checkpoint within f32 raster precision
    assert!((resumed.lakes()[0].storage_m3 - s1).abs() < 1e3);
    assert!((resumed.lakes()[0].outflow_m3s - o1).abs() < 1e-2);
}


/*
Engineered discharge run: the prescribed values, keyed by stamp, replace the
computed release and land in the discharge vector at the lake cell.
 */
#[test]
fn test_simulate_engineered_discharge() {
    let damq = "time,tana\n\
                20200101_0000,111.0\n\
                20200101_0100,222.0\n\
                20200101_0200,333.0\n";
    let (control_text, dir) = build_domain("damq", "damq = DAMQ_PATH", "wm_flag = yes");
    let damq_path = dir.join("damq.csv");
    fs::write(&damq_path, damq).unwrap();
    let control_text = control_text.replace("DAMQ_PATH",
                                            damq_path.to_str().unwrap());

    let control = parse_control(&control_text).unwrap();
    let mut sim = Simulator::initialize(&control, &control.tasks[0]).unwrap();

    let t0 = stamp_to_u64("20200101_0000").unwrap();
    let lake_node = sim.lakes()[0].node_idx.unwrap();

    sim.step(t0).unwrap();
    assert_eq!(sim.lakes()[0].outflow_m3s, 111.0);
    assert_eq!(sim.current_q()[lake_node], 111.0);

    sim.step(t0 + 3600).unwrap();
    assert_eq!(sim.lakes()[0].outflow_m3s, 222.0);
    assert_eq!(sim.current_q()[lake_node], 222.0);

    //A stamp beyond the table prescribes zero
    sim.step(t0 + 3 * 3600).unwrap();
    assert_eq!(sim.lakes()[0].outflow_m3s, 0.0);
    assert_eq!(sim.current_q()[lake_node], 0.0);
}


/*
The abort flag ends the run at a step boundary: nothing is simulated and the
final state save still happens.
 */
#[test]
fn test_abort_before_first_step() {
    let (control_text, dir) = build_domain("abort", "", "");
    let control = parse_control(&control_text).unwrap();
    let mut sim = Simulator::initialize(&control, &control.tasks[0]).unwrap();

    sim.abort_flag().store(true, std::sync::atomic::Ordering::Relaxed);
    sim.simulate().unwrap();

    //No steps ran, so the volume series is empty
    let volumes = read_observed_ts(
        dir.join("lake_volumes.csv").to_str().unwrap()).unwrap();
    assert_eq!(volumes.len(), 0);
    //The final save wrote the untouched initial state
    assert!(dir.join("lake_storage_20200101_0000.tif").exists());
}


/*
The basin-average task writes per-gauge drainage areas.
 */
#[test]
fn test_basin_avg() {
    let (control_text, dir) = build_domain("avg", "", "");
    let control_text = control_text.replace("style = simu", "style = basin_avg");
    let control = parse_control(&control_text).unwrap();
    let mut sim = Simulator::initialize(&control, &control.tasks[0]).unwrap();
    sim.basin_avg().unwrap();

    let summary = fs::read_to_string(dir.join("basin_avg_little.csv")).unwrap();
    assert!(summary.starts_with("gauge,area_km2,mean_precip"));
    assert!(summary.contains("out,"));
}
