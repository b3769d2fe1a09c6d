use std::fs::File;
use std::io::{self, Write};

/// Running estimate after every sample, one row per sample.
pub fn write_trace(path: &str, trace: &[f64]) -> io::Result<()> {
    let mut f = File::create(path)?;
    writeln!(f, "sample,estimate")?;
    for (i, estimate) in trace.iter().enumerate() {
        writeln!(f, "{},{}", i + 1, estimate)?;
    }
    Ok(())
}

pub fn write_table(path: &str, header: &[&str], rows: &[Vec<f64>]) -> io::Result<()> {
    let mut f = File::create(path)?;
    writeln!(f, "{}", header.join(","))?;
    for row in rows {
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(f, "{}", cells.join(","))?;
    }
    Ok(())
}
