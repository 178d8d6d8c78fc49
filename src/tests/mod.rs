#[cfg(test)]
mod test_tid;

#[cfg(test)]
mod test_timeseries;



#[cfg(test)]
mod test_csv_io;



#[cfg(test)]
mod test_carve;



#[cfg(test)]
mod test_simulator;
