use anyhow::{bail, Context, Result};
use citybuf::{Fields, PointCloud};
use std::io::{BufRead, BufReader, Read};

/// Name of the field filled from a fourth column.
pub const VALUE_FIELD: &str = "value";

/// Parse `x y z [value]` rows, separated by whitespace or commas.
///
/// Blank lines and `#` comments are ignored. Either every row carries a
/// value or none does.
pub fn parse_xyz<R: Read>(reader: R) -> Result<(PointCloud, Option<Fields>)> {
    let mut points = Vec::new();
    let mut values = Vec::new();

    for (number, line_result) in BufReader::new(reader).lines().enumerate() {
        let line = line_result?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let columns = trimmed
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<f64>())
            .collect::<std::result::Result<Vec<f64>, _>>()
            .with_context(|| format!("line {}: bad number", number + 1))?;

        match columns.as_slice() {
            [x, y, z] => points.push([*x, *y, *z]),
            [x, y, z, v] => {
                points.push([*x, *y, *z]);
                values.push(*v as f32);
            }
            other => bail!("line {}: expected 3 or 4 columns, got {}", number + 1, other.len()),
        }
    }

    let fields = match values.len() {
        0 => None,
        n if n == points.len() => Some([(VALUE_FIELD, values)].into_iter().collect()),
        n => bail!("{n} of {} rows carry a value", points.len()),
    };

    Ok((PointCloud::new(points), fields))
}
