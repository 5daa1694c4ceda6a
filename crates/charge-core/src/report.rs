//! Plain-text availability report.
//!
//! Output is driven by topology order only, so identical inputs render byte-identical
//! text regardless of the order upstream answers arrived in.

use std::collections::HashSet;

use unicode_width::UnicodeWidthStr;

use crate::{
    domain::{DeviceId, PortStatus, Scope},
    fetcher::PortsByDevice,
    topology::Topology,
};

/// Device has no credential and nothing was reported: we could not ask.
pub const NEEDS_DATA_MARKER: &str = "⚠️待校准";
/// We asked and the vendor reported no ports.
pub const NO_PORTS_MARKER: &str = "暂无端口数据";
pub const IDLE_MARKER: &str = "空闲";
pub const CHARGING_MARKER: &str = "⚡";

/// Power readings below this are treated as this value when estimating time.
pub const MIN_POWER: f64 = 1.0;
pub const PORTS_PER_ROW: usize = 4;
pub const CELL_WIDTH: usize = 12;

const NAME_GAP: usize = 2;

/// Render the report for the given scope.
///
/// `resolved` holds the devices with a usable credential; it decides between the
/// "needs data" marker and the "no ports" marker for devices with empty results.
pub fn render(
    topology: &Topology,
    ports: &PortsByDevice,
    resolved: &HashSet<DeviceId>,
    campus: &Scope,
    area: &Scope,
) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut current_campus: Option<&str> = None;

    for (campus_name, area_name, devices) in topology.walk(campus, area) {
        if current_campus != Some(campus_name) {
            if current_campus.is_some() {
                out.push(String::new());
            }
            out.push(format!("【{campus_name}】"));
            current_campus = Some(campus_name);
        }

        let (idle, total) = devices
            .keys()
            .filter_map(|id| ports.get(id))
            .flatten()
            .fold((0usize, 0usize), |(idle, total), p| {
                (idle + usize::from(!p.charging), total + 1)
            });
        out.push(format!("▸ {area_name}（空闲 {idle} / 共 {total}）"));

        let name_width = devices
            .values()
            .map(|n| display_width(n))
            .max()
            .unwrap_or(0);

        for (id, name) in devices {
            let device_ports = ports.get(id).map(Vec::as_slice).unwrap_or(&[]);
            let is_resolved = resolved.contains(id);
            out.extend(render_device(name, name_width, device_ports, is_resolved));
        }
    }

    out.join("\n")
}

fn render_device(
    name: &str,
    name_width: usize,
    ports: &[PortStatus],
    is_resolved: bool,
) -> Vec<String> {
    let label = pad_right(name, name_width + NAME_GAP);

    if ports.is_empty() {
        let marker = if is_resolved {
            NO_PORTS_MARKER
        } else {
            NEEDS_DATA_MARKER
        };
        return vec![format!("{label}{marker}").trim_end().to_string()];
    }

    let indent = " ".repeat(name_width + NAME_GAP);
    ports
        .chunks(PORTS_PER_ROW)
        .enumerate()
        .map(|(row, chunk)| {
            let cells: String = chunk
                .iter()
                .map(|p| pad_right(&port_cell(p), CELL_WIDTH))
                .collect();
            let prefix = if row == 0 { label.as_str() } else { indent.as_str() };
            format!("{prefix}{cells}").trim_end().to_string()
        })
        .collect()
}

fn port_cell(p: &PortStatus) -> String {
    let label = p.port_index.saturating_add(1);
    if p.charging {
        format!("[{label}]{CHARGING_MARKER}{:.1}h", charge_hours(p))
    } else {
        format!("[{label}]{IDLE_MARKER}")
    }
}

/// Hours shown for a charging port: the vendor's elapsed time when present, otherwise
/// an estimate from energy over (floored) power.
pub fn charge_hours(p: &PortStatus) -> f64 {
    if let Some(h) = p.elapsed_hours {
        if h.is_finite() && h >= 0.0 {
            return h;
        }
    }
    let power = if p.power.is_finite() {
        p.power.max(MIN_POWER)
    } else {
        MIN_POWER
    };
    let energy = if p.energy.is_finite() { p.energy } else { 0.0 };
    (energy / power).max(0.0)
}

/// Terminal column width; wide (CJK / fullwidth / emoji) characters count as 2.
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

fn pad_right(s: &str, width: usize) -> String {
    let w = display_width(s);
    let mut out = s.to_string();
    out.push_str(&" ".repeat(width.saturating_sub(w)));
    out
}
