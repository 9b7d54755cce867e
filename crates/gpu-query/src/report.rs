//! Rendering of device reports for the command line.

use std::io::{self, Write};

use serde::Serialize;

use crate::backend::Backend;
use crate::error::Error;
use crate::query::DeviceQuery;
use crate::types::{DeviceProperties, UtilizationSample};

pub const NO_DEVICES: &str = "No devices found.";

/// Column width for property labels in text output.
const LABEL_WIDTH: usize = 30;

#[derive(Debug, Serialize)]
pub struct DeviceReport<'a> {
    pub index: usize,
    pub properties: &'a DeviceProperties,
    pub utilization: Option<UtilizationSample>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Builds reports for every device, or only `only` when given.
///
/// A failed utilization query is logged and recorded on its report so the
/// remaining devices are still listed. An invalid `only` index is an error.
pub fn collect<B: Backend>(
    query: &DeviceQuery<B>,
    only: Option<usize>,
) -> Result<Vec<DeviceReport<'_>>, Error> {
    let indices: Vec<usize> = match only {
        Some(index) => {
            query.get_device(index)?;
            vec![index]
        }
        None => (0..query.list_devices().len()).collect(),
    };

    let mut reports = Vec::with_capacity(indices.len());
    for index in indices {
        let properties = query.get_device(index)?;
        let (utilization, error) = match query.get_utilization(index) {
            Ok(utilization) => (utilization, None),
            Err(err) => {
                tracing::error!(device = index, "Failed to query utilization: {err}");
                (None, Some(err.to_string()))
            }
        };
        reports.push(DeviceReport {
            index,
            properties,
            utilization,
            error,
        });
    }
    Ok(reports)
}

pub fn write_text<W: Write>(out: &mut W, reports: &[DeviceReport<'_>]) -> io::Result<()> {
    if reports.is_empty() {
        return writeln!(out, "{NO_DEVICES}");
    }

    for report in reports {
        writeln!(out, "Device #{}: {}", report.index, report.properties.name)?;
        for (label, value) in report.properties.scalar_fields() {
            writeln!(out, "{label:>LABEL_WIDTH$} {value}")?;
        }
        if let Some(utilization) = report.utilization {
            writeln!(out, "{:>LABEL_WIDTH$} {}% (NVML)", "GPU utilization", utilization.gpu)?;
            writeln!(
                out,
                "{:>LABEL_WIDTH$} {}% (NVML)",
                "Memory utilization", utilization.memory
            )?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn write_json<W: Write>(out: &mut W, reports: &[DeviceReport<'_>]) -> serde_json::Result<()> {
    serde_json::to_writer_pretty(&mut *out, reports)?;
    writeln!(out).map_err(serde_json::Error::io)
}
