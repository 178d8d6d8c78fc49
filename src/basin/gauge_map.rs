use crate::basin::gauge::Gauge;
use crate::basin::grid_node::GridNode;
use crate::error::{LimnoError, Result};
use crate::tid::utils::{u64_to_iso_datetime_string, u64_to_stamp};
use log::{info, warn};
use std::fs;
use std::path::Path;

/*
The upstream-gauge tree. For each gauge i, upstream[i] holds the indices of
every gauge upstream of it, direct and transitive. The closure is maintained
incrementally: adding (d, u) appends u to every list that already contains d,
so edges must be recorded from the outlet upwards (the carve does this).
 */
#[derive(Clone, Default)]
pub struct GaugeMap {
    names: Vec<String>,
    upstream: Vec<Vec<usize>>,
}

impl GaugeMap {
    pub fn initialize(gauges: &[Gauge]) -> GaugeMap {
        GaugeMap {
            names: gauges.iter().map(|g| g.name.clone()).collect(),
            upstream: vec![vec![]; gauges.len()],
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn gauge_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n.eq_ignore_ascii_case(name))
    }

    pub fn upstream_of(&self, gauge_idx: usize) -> &[usize] {
        &self.upstream[gauge_idx]
    }

    /*
    Records upstream as a direct upstream gauge of downstream, then propagates
    transitively. The pair must not already be present; area-weighted sums
    would double-count a duplicate.
     */
    pub fn add_upstream(&mut self, downstream: usize, upstream: usize) -> Result<()> {
        if self.upstream[downstream].contains(&upstream) {
            return Err(LimnoError::Config(format!(
                "{} is already upstream of {}",
                self.names[upstream], self.names[downstream]
            )));
        }
        info!("{} is upstream (direct) of {}",
              self.names[upstream], self.names[downstream]);
        self.upstream[downstream].push(upstream);

        for i in 0..self.upstream.len() {
            if i == downstream {
                continue;
            }
            if self.upstream[i].contains(&downstream) && !self.upstream[i].contains(&upstream) {
                info!("{} is upstream (indirect) of {}",
                      self.names[upstream], self.names[i]);
                self.upstream[i].push(upstream);
            }
        }
        Ok(())
    }

    /*
    Area-weighted average of a per-node value for each gauge, honouring the
    upstream tree. Two passes: per-gauge partial sums over owned nodes, then
    totals folded down the tree. A gauge draining no area yields NaN.
     */
    pub fn gauge_average(&self, nodes: &[GridNode], values: &[f64]) -> Vec<f64> {
        let count_gauges = self.names.len();
        let mut partial_val = vec![0.0; count_gauges];
        let mut partial_area = vec![0.0; count_gauges];

        for (i, node) in nodes.iter().enumerate() {
            partial_val[node.gauge_idx] += values[i] * node.area_m2;
            partial_area[node.gauge_idx] += node.area_m2;
        }

        let mut averages = vec![0.0; count_gauges];
        for i in 0..count_gauges {
            let mut total_val = partial_val[i];
            let mut total_area = partial_area[i];
            for &j in &self.upstream[i] {
                total_val += partial_val[j];
                total_area += partial_area[j];
            }
            averages[i] = total_val / total_area;
        }
        averages
    }

    /*
    Total drainage area of each gauge, including its upstream gauges.
     */
    pub fn gauge_area(&self, nodes: &[GridNode]) -> Vec<f64> {
        let count_gauges = self.names.len();
        let mut partial_area = vec![0.0; count_gauges];
        for node in nodes.iter() {
            partial_area[node.gauge_idx] += node.area_m2;
        }

        let mut areas = vec![0.0; count_gauges];
        for i in 0..count_gauges {
            let mut total_area = partial_area[i];
            for &j in &self.upstream[i] {
                total_area += partial_area[j];
            }
            areas[i] = total_area;
        }
        areas
    }

    /*
    Serializes the upstream adjacency as downstream,upstream lines under a
    commented, timestamped header.
     */
    pub fn save_relationships(&self, current_time: u64, state_path: &str) -> Result<()> {
        let filename = format!("{}/gauge_relationships_{}.txt",
                               state_path, u64_to_stamp(current_time));

        let mut contents = String::new();
        contents.push_str("# Gauge Relationships State File\n");
        contents.push_str(&format!("# Generated: {}\n",
                                   u64_to_iso_datetime_string(current_time)));
        contents.push_str("# Format: downstream_gauge_name,upstream_gauge_name\n");
        for i in 0..self.names.len() {
            for &j in &self.upstream[i] {
                contents.push_str(&format!("{},{}\n", self.names[i], self.names[j]));
            }
        }

        fs::write(Path::new(&filename), contents)?;
        info!("Saved gauge relationships to: {}", filename);
        Ok(())
    }

    /*
    Clears the tree and re-inserts every edge found in the snapshot written at
    begin_time. Returns false when no snapshot exists, in which case the
    relationships are rebuilt from scratch by the carve.
     */
    pub fn load_relationships(&mut self, begin_time: u64, state_path: &str) -> bool {
        let filename = format!("{}/gauge_relationships_{}.txt",
                               state_path, u64_to_stamp(begin_time));
        let contents = match fs::read_to_string(Path::new(&filename)) {
            Ok(c) => c,
            Err(_) => {
                info!("No gauge relationships state file found: {}", filename);
                return false;
            }
        };
        info!("Loading gauge relationships from: {}", filename);

        for list in self.upstream.iter_mut() {
            list.clear();
        }

        for (line_num, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (downstream_name, upstream_name) = match line.split_once(',') {
                Some(pair) => pair,
                None => {
                    warn!("Invalid format in line {}: {}", line_num + 1, line);
                    continue;
                }
            };
            let d = self.gauge_index(downstream_name.trim());
            let u = self.gauge_index(upstream_name.trim());
            match (d, u) {
                (Some(d), Some(u)) => {
                    // The snapshot carries the full closure, so transitive pairs
                    // may already be present by the time their line is reached.
                    if !self.upstream[d].contains(&u) {
                        if let Err(e) = self.add_upstream(d, u) {
                            warn!("Skipping relationship in line {}: {}", line_num + 1, e);
                        }
                    }
                }
                _ => {
                    warn!("Could not find gauges in line {}: {},{}",
                          line_num + 1, downstream_name, upstream_name);
                }
            }
        }
        true
    }
}
