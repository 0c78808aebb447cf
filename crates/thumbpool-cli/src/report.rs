use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use thumbpool::InfoResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Ok,
    Failed,
    /// No result arrived before the timeout.
    Pending,
}

impl RowStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Failed => "failed",
            Self::Pending => "pending",
        }
    }
}

/// One line of output, describing one browsed file.
#[derive(Debug, Clone, Serialize)]
pub struct RowReport {
    pub row: usize,
    pub path: String,
    pub status: RowStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<(u32, u32)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RowReport {
    pub fn pending(row: usize, path: &Path) -> Self {
        Self {
            row,
            path: path.display().to_string(),
            status: RowStatus::Pending,
            width: None,
            height: None,
            pixel: None,
            format: None,
            thumbnail: None,
            proxy: None,
            error: None,
        }
    }

    pub fn from_result(path: &Path, result: &InfoResult) -> Self {
        let mut report = Self::pending(result.row, path);

        if let Some(header) = &result.metadata {
            report.status = RowStatus::Ok;
            report.width = Some(header.size.width);
            report.height = Some(header.size.height);
            report.pixel = Some(format!("{:?}", header.pixel));
            report.format = header.tag("format").map(str::to_owned);
            report.thumbnail = result.thumbnail.as_ref().map(|t| t.dimensions());
            report.proxy = Some(format!("{:?}", result.proxy));
        }

        if let Some(e) = &result.error {
            report.status = RowStatus::Failed;
            report.error = Some(e.to_string());
        }

        report
    }
}

pub fn write_text<W: Write>(out: &mut W, reports: &[RowReport]) -> io::Result<()> {
    writeln!(
        out,
        "{:>5}  {:<7}  {:>11}  {:<7}  {:<6}  {:>9}  {:<7}  PATH",
        "ROW", "STATUS", "SIZE", "PIXEL", "FORMAT", "THUMB", "PROXY"
    )?;

    for r in reports {
        let size = match (r.width, r.height) {
            (Some(w), Some(h)) => format!("{w}x{h}"),
            _ => "-".to_owned(),
        };
        let thumb = r
            .thumbnail
            .map_or_else(|| "-".to_owned(), |(w, h)| format!("{w}x{h}"));

        writeln!(
            out,
            "{:>5}  {:<7}  {:>11}  {:<7}  {:<6}  {:>9}  {:<7}  {}",
            r.row,
            r.status.as_str(),
            size,
            r.pixel.as_deref().unwrap_or("-"),
            r.format.as_deref().unwrap_or("-"),
            thumb,
            r.proxy.as_deref().unwrap_or("-"),
            r.path,
        )?;
        if let Some(e) = &r.error {
            writeln!(out, "{:>5}  {e}", "")?;
        }
    }

    Ok(())
}

pub fn write_json<W: Write>(out: &mut W, reports: &[RowReport]) -> io::Result<()> {
    for r in reports {
        serde_json::to_writer(&mut *out, r)?;
        writeln!(out)?;
    }
    Ok(())
}
