//! PLY (Polygon File Format) I/O
//!
//! Only the ASCII encoding is supported. Vertices carry `x y z` and an
//! optional `red green blue` triple; other vertex properties are skipped.

use crate::{Error, Result};
use nalgebra::Point3;
use sj_core::{PointCloud, Rgb};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

struct VertexLayout {
    count: usize,
    columns: usize,
    position: [usize; 3],
    color: Option<[usize; 3]>,
    /// Float colors are stored in `[0, 1]`.
    float_color: bool,
}

fn parse_header<I>(lines: &mut I) -> Result<VertexLayout>
where
    I: Iterator<Item = std::io::Result<String>>,
{
    let magic = lines
        .next()
        .ok_or_else(|| Error::Parse("Empty PLY file".to_string()))??;
    if magic.trim() != "ply" {
        return Err(Error::Parse("Missing 'ply' magic line".to_string()));
    }

    let mut format = String::new();
    let mut count = None;
    let mut in_vertex = false;
    let mut properties: Vec<(String, String)> = Vec::new();

    loop {
        let line = lines
            .next()
            .ok_or_else(|| Error::Parse("Unexpected EOF in header".to_string()))??;
        let parts: Vec<&str> = line.split_whitespace().collect();

        match parts.as_slice() {
            ["format", fmt, ..] => format = fmt.to_string(),
            ["element", "vertex", n] => {
                count = Some(
                    n.parse()
                        .map_err(|_| Error::Parse(format!("Invalid vertex count: {}", n)))?,
                );
                in_vertex = true;
            }
            ["element", ..] => in_vertex = false,
            ["property", "list", ..] if in_vertex => {
                return Err(Error::UnsupportedFormat(
                    "List properties on vertices".to_string(),
                ))
            }
            ["property", ty, name] if in_vertex => {
                properties.push((ty.to_string(), name.to_string()))
            }
            ["end_header"] => break,
            _ => {}
        }
    }

    if format != "ascii" {
        return Err(Error::UnsupportedFormat(format!(
            "PLY format '{}' not supported, only ASCII",
            format
        )));
    }
    let count = count.ok_or_else(|| Error::Parse("No vertex element".to_string()))?;

    let find = |name: &str| properties.iter().position(|(_, n)| n == name);
    let position = match (find("x"), find("y"), find("z")) {
        (Some(x), Some(y), Some(z)) => [x, y, z],
        _ => return Err(Error::Parse("Vertex lacks x/y/z".to_string())),
    };
    let color = match (find("red"), find("green"), find("blue")) {
        (Some(r), Some(g), Some(b)) => Some([r, g, b]),
        _ => None,
    };
    let float_color = color
        .map(|c| matches!(properties[c[0]].0.as_str(), "float" | "float32" | "double"))
        .unwrap_or(false);

    Ok(VertexLayout {
        count,
        columns: properties.len(),
        position,
        color,
        float_color,
    })
}

fn color_component(value: f32, float_color: bool) -> u8 {
    if float_color {
        (value.clamp(0.0, 1.0) * 255.0).round() as u8
    } else {
        value.clamp(0.0, 255.0) as u8
    }
}

/// Read a PLY point cloud from a reader. Vertices without color get black.
pub fn read_ply<R: BufRead>(reader: R) -> Result<PointCloud> {
    let mut lines = reader.lines();
    let layout = parse_header(&mut lines)?;

    let mut cloud = PointCloud::with_capacity(layout.count);
    let mut values = Vec::with_capacity(layout.columns);

    for row in 0..layout.count {
        let line = lines
            .next()
            .ok_or_else(|| Error::Parse(format!("Unexpected EOF at vertex {}", row)))??;

        values.clear();
        for s in line.split_whitespace() {
            values.push(
                s.parse::<f32>()
                    .map_err(|_| Error::Parse(format!("Invalid number: {}", s)))?,
            );
        }
        if values.len() < layout.columns {
            return Err(Error::Parse(format!(
                "Vertex {} has {} values, expected {}",
                row,
                values.len(),
                layout.columns
            )));
        }

        let [x, y, z] = layout.position;
        let color: Rgb = match layout.color {
            Some([r, g, b]) => [
                color_component(values[r], layout.float_color),
                color_component(values[g], layout.float_color),
                color_component(values[b], layout.float_color),
            ],
            None => [0, 0, 0],
        };
        cloud.push(Point3::new(values[x], values[y], values[z]), color);
    }

    Ok(cloud)
}

/// Write a point cloud in ASCII PLY with uchar colors.
pub fn write_ply<W: Write>(writer: &mut W, cloud: &PointCloud) -> Result<()> {
    writeln!(writer, "ply")?;
    writeln!(writer, "format ascii 1.0")?;
    writeln!(writer, "element vertex {}", cloud.len())?;
    writeln!(writer, "property float x")?;
    writeln!(writer, "property float y")?;
    writeln!(writer, "property float z")?;
    writeln!(writer, "property uchar red")?;
    writeln!(writer, "property uchar green")?;
    writeln!(writer, "property uchar blue")?;
    writeln!(writer, "end_header")?;

    for (p, c) in cloud.iter() {
        writeln!(writer, "{} {} {} {} {} {}", p.x, p.y, p.z, c[0], c[1], c[2])?;
    }

    Ok(())
}

pub fn read_ply_file<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::MissingFile(path.to_path_buf()));
    }
    read_ply(BufReader::new(File::open(path)?))
}

pub fn write_ply_file<P: AsRef<Path>>(path: P, cloud: &PointCloud) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_ply(&mut writer, cloud)?;
    writer.flush()?;
    Ok(())
}
