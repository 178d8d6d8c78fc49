// Control file intake. The control file is INI-shaped: `[basic]` names the
// basic grids, `[gauge <name>]` / `[inlet <name>]` / `[basin <name>]` declare
// the network, and `[task <name>]` describes a run. Keys are case-insensitive
// and unknown keys are configuration errors, so typos fail loudly at load
// time instead of silently changing a simulation.

use crate::error::{LimnoError, Result};
use crate::io::csv_io::truthy;
use crate::tid::utils::date_string_to_u64_flexible;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct BasicPaths {
    pub dem: String,
    pub ddm: String,
    pub fam: String,
}

#[derive(Debug, Clone, Default)]
pub struct GaugeSection {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub obs_fam: Option<f64>,
    pub output_ts: bool,
    pub obs_file: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct InletSection {
    pub name: String,
    pub lake_name: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub cell_x: Option<usize>,
    pub cell_y: Option<usize>,
    pub obs_file: String,
}

#[derive(Debug, Clone, Default)]
pub struct BasinSection {
    pub name: String,
    pub gauge_names: Vec<String>,
    pub lake_list_file: Option<String>,
    pub dam_q_file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStyle {
    Simu,
    BasinAvg,
}

#[derive(Debug, Clone)]
pub struct TaskSection {
    pub name: String,
    pub style: RunStyle,
    pub basin: String,
    pub begin: u64,
    pub end: u64,
    pub step_hours: f64,
    pub precip_pattern: Option<String>,
    pub pet_pattern: Option<String>,
    pub precip_convert: f64,
    pub pet_convert: f64,
    pub output_path: String,
    pub state_path: Option<String>,
    pub save_state_time: Option<u64>,
    pub use_states: bool,
    pub wm_flag: bool,
    pub gridded_output: bool,
}

impl Default for TaskSection {
    fn default() -> TaskSection {
        TaskSection {
            name: "".to_string(),
            style: RunStyle::Simu,
            basin: "".to_string(),
            begin: 0,
            end: 0,
            step_hours: 0.0,
            precip_pattern: None,
            pet_pattern: None,
            precip_convert: 1.0,
            pet_convert: 1.0,
            output_path: ".".to_string(),
            state_path: None,
            save_state_time: None,
            use_states: false,
            wm_flag: false,
            gridded_output: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ControlFile {
    pub basic: BasicPaths,
    pub gauges: Vec<GaugeSection>,
    pub inlets: Vec<InletSection>,
    pub basins: Vec<BasinSection>,
    pub tasks: Vec<TaskSection>,
}

impl ControlFile {
    pub fn gauge(&self, name: &str) -> Option<&GaugeSection> {
        self.gauges.iter().find(|g| g.name.eq_ignore_ascii_case(name))
    }

    pub fn basin(&self, name: &str) -> Option<&BasinSection> {
        self.basins.iter().find(|b| b.name.eq_ignore_ascii_case(name))
    }
}

pub fn read_control_file(path: &str) -> Result<ControlFile> {
    let content = fs::read_to_string(Path::new(path))?;
    parse_control(&content)
}

pub fn parse_control(content: &str) -> Result<ControlFile> {
    let mut control = ControlFile::default();
    let mut basic_seen = false;

    // The section currently being filled
    enum Section {
        None,
        Basic,
        Gauge(GaugeSection),
        Inlet(InletSection),
        Basin(BasinSection),
        Task(TaskSection),
    }
    let mut current = Section::None;

    // Closes the current section, running its validation
    fn finish(current: Section, control: &mut ControlFile) -> Result<()> {
        match current {
            Section::None | Section::Basic => {}
            Section::Gauge(g) => {
                control.gauges.push(g);
            }
            Section::Inlet(i) => {
                if i.lat.is_none() && i.cell_y.is_none() {
                    return Err(LimnoError::Config(format!(
                        "The latitude was not specified for inlet {}", i.name)));
                }
                if i.lon.is_none() && i.cell_x.is_none() {
                    return Err(LimnoError::Config(format!(
                        "The longitude was not specified for inlet {}", i.name)));
                }
                if i.lake_name.is_empty() {
                    return Err(LimnoError::Config(format!(
                        "The lake name was not specified for inlet {}", i.name)));
                }
                if i.obs_file.is_empty() {
                    return Err(LimnoError::Config(format!(
                        "The inletq file was not specified for inlet {}", i.name)));
                }
                control.inlets.push(i);
            }
            Section::Basin(b) => {
                if b.gauge_names.is_empty() {
                    return Err(LimnoError::Config(
                        "A basin was defined which contains no gauges!".to_string()));
                }
                control.basins.push(b);
            }
            Section::Task(t) => {
                if t.basin.is_empty() {
                    return Err(LimnoError::Config(format!(
                        "Task {} names no basin", t.name)));
                }
                if t.step_hours <= 0.0 {
                    return Err(LimnoError::Config(format!(
                        "Task {} has no positive timestep", t.name)));
                }
                if t.end <= t.begin {
                    return Err(LimnoError::Config(format!(
                        "Task {} has an empty simulation window", t.name)));
                }
                control.tasks.push(t);
            }
        }
        Ok(())
    }

    for (line_no, raw_line) in content.lines().enumerate() {
        let line = match raw_line.find('#') {
            Some(pos) => raw_line[..pos].trim(),
            None => raw_line.trim(),
        };
        if line.is_empty() {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            let header = line[1..line.len() - 1].trim();
            let (kind, arg) = match header.find(char::is_whitespace) {
                Some(pos) => (header[..pos].to_lowercase(), header[pos..].trim().to_string()),
                None => (header.to_lowercase(), "".to_string()),
            };
            let previous = std::mem::replace(&mut current, Section::None);
            finish(previous, &mut control)?;
            current = match kind.as_str() {
                "basic" => {
                    if basic_seen {
                        return Err(LimnoError::Config(
                            "Duplicate basic section".to_string()));
                    }
                    basic_seen = true;
                    Section::Basic
                }
                "gauge" => {
                    if control.gauge(&arg).is_some() {
                        return Err(LimnoError::Config(format!(
                            "Duplicate gauge \"{}\"", arg)));
                    }
                    Section::Gauge(GaugeSection { name: arg, ..Default::default() })
                }
                "inlet" => {
                    if control.inlets.iter().any(|i| i.name.eq_ignore_ascii_case(&arg)) {
                        return Err(LimnoError::Config(format!(
                            "Duplicate inlet \"{}\"", arg)));
                    }
                    Section::Inlet(InletSection { name: arg, ..Default::default() })
                }
                "basin" => {
                    if control.basin(&arg).is_some() {
                        return Err(LimnoError::Config(format!(
                            "Duplicate basin \"{}\"", arg)));
                    }
                    Section::Basin(BasinSection { name: arg, ..Default::default() })
                }
                "task" => Section::Task(TaskSection { name: arg, ..Default::default() }),
                _ => {
                    return Err(LimnoError::Config(format!(
                        "Unknown section \"{}\" on line {}", header, line_no + 1)));
                }
            };
            continue;
        }

        let (key, value) = match line.find('=') {
            Some(pos) => (line[..pos].trim().to_lowercase(), line[pos + 1..].trim()),
            None => {
                return Err(LimnoError::Config(format!(
                    "Expected key=value on line {}", line_no + 1)));
            }
        };

        match &mut current {
            Section::None => {
                return Err(LimnoError::Config(format!(
                    "Key \"{}\" outside any section on line {}", key, line_no + 1)));
            }
            Section::Basic => match key.as_str() {
                "dem" => control.basic.dem = value.to_string(),
                "ddm" => control.basic.ddm = value.to_string(),
                "fam" => control.basic.fam = value.to_string(),
                _ => {
                    return Err(LimnoError::Config(format!(
                        "Unknown key value \"{}={}\" in basic section", key, value)));
                }
            },
            Section::Gauge(g) => match key.as_str() {
                "lat" => g.lat = parse_f64(&key, value)?,
                "lon" => g.lon = parse_f64(&key, value)?,
                "obsfam" => g.obs_fam = Some(parse_f64(&key, value)?),
                "outputts" => g.output_ts = truthy(value),
                "obsq" => g.obs_file = Some(value.to_string()),
                _ => {
                    return Err(LimnoError::Config(format!(
                        "Unknown key value \"{}={}\" in gauge {}", key, value, g.name)));
                }
            },
            Section::Inlet(i) => match key.as_str() {
                "lat" => i.lat = Some(parse_f64(&key, value)?),
                "lon" => i.lon = Some(parse_f64(&key, value)?),
                "cellx" => i.cell_x = Some(parse_usize(&key, value)?),
                "celly" => i.cell_y = Some(parse_usize(&key, value)?),
                "lakename" => i.lake_name = value.to_string(),
                "inletq" => i.obs_file = value.to_string(),
                _ => {
                    return Err(LimnoError::Config(format!(
                        "Unknown key value \"{}={}\" in inlet {}", key, value, i.name)));
                }
            },
            Section::Basin(b) => match key.as_str() {
                "gauge" => {
                    if b.gauge_names.iter().any(|g| g.eq_ignore_ascii_case(value)) {
                        return Err(LimnoError::Config(format!(
                            "Duplicate gauge \"{}\" in basin!", value)));
                    }
                    b.gauge_names.push(value.to_string());
                }
                "lakelistfile" => b.lake_list_file = Some(value.to_string()),
                "damq" => b.dam_q_file = Some(value.to_string()),
                _ => {
                    return Err(LimnoError::Config(format!(
                        "Unknown key value \"{}={}\" in basin {}", key, value, b.name)));
                }
            },
            Section::Task(t) => match key.as_str() {
                "style" => {
                    t.style = match value.to_lowercase().as_str() {
                        "simu" => RunStyle::Simu,
                        "basin_avg" => RunStyle::BasinAvg,
                        _ => {
                            return Err(LimnoError::Config(format!(
                                "Unimplemented run style \"{}\"", value)));
                        }
                    };
                }
                "basin" => t.basin = value.to_string(),
                "time_begin" => t.begin = parse_time(&key, value)?,
                "time_end" => t.end = parse_time(&key, value)?,
                "timestep_hours" => t.step_hours = parse_f64(&key, value)?,
                "precip" => t.precip_pattern = Some(value.to_string()),
                "pet" => t.pet_pattern = Some(value.to_string()),
                "precip_convert" => t.precip_convert = parse_f64(&key, value)?,
                "pet_convert" => t.pet_convert = parse_f64(&key, value)?,
                "output" => t.output_path = value.to_string(),
                "states" => t.state_path = Some(value.to_string()),
                "state_time" => t.save_state_time = Some(parse_time(&key, value)?),
                "use_states" => t.use_states = truthy(value),
                "wm_flag" => t.wm_flag = truthy(value),
                "gridded_output" => t.gridded_output = truthy(value),
                _ => {
                    return Err(LimnoError::Config(format!(
                        "Unknown key value \"{}={}\" in task {}", key, value, t.name)));
                }
            },
        }
    }
    finish(current, &mut control)?;

    if !basic_seen {
        return Err(LimnoError::Config("No basic section specified!".to_string()));
    }

    // Basins may only reference declared gauges
    for basin in &control.basins {
        for gauge_name in &basin.gauge_names {
            if control.gauge(gauge_name).is_none() {
                return Err(LimnoError::Config(format!(
                    "Unknown gauge \"{}\" in basin!", gauge_name)));
            }
        }
    }

    Ok(control)
}

fn parse_f64(key: &str, value: &str) -> Result<f64> {
    value.parse::<f64>().map_err(|_| {
        LimnoError::Config(format!("Bad numeric value \"{}={}\"", key, value))
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize> {
    value.parse::<usize>().map_err(|_| {
        LimnoError::Config(format!("Bad integer value \"{}={}\"", key, value))
    })
}

fn parse_time(key: &str, value: &str) -> Result<u64> {
    match date_string_to_u64_flexible(value) {
        Ok((t, _format)) => Ok(t),
        Err(_) => Err(LimnoError::Config(format!(
            "Bad time value \"{}={}\"", key, value))),
    }
}
