//! Remote statements over http(s).

use std::io::{Read, Seek, SeekFrom};
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};
use url::Url;

use super::{AcquiredDocument, spool_file};
use crate::config::AcquisitionConfig;
use crate::document::SourceLocator;
use crate::error::AcquisitionError;

/// Download `raw_url` into a spool file and read it back.
///
/// Runs on a blocking thread; the client is built and dropped here.
pub(super) fn fetch(
    config: &AcquisitionConfig,
    raw_url: &str,
) -> Result<AcquiredDocument, AcquisitionError> {
    let url = Url::parse(raw_url).map_err(|e| AcquisitionError::InvalidUrl {
        url: raw_url.to_string(),
        reason: e.to_string(),
    })?;
    let shown = redact(&url);

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| AcquisitionError::Download {
            url: shown.clone(),
            reason: e.to_string(),
        })?;

    let response = client.get(url.clone()).send().map_err(|e| {
        if e.is_timeout() {
            AcquisitionError::Timeout {
                url: shown.clone(),
                secs: config.timeout_secs,
            }
        } else {
            AcquisitionError::Download {
                url: shown.clone(),
                reason: e.to_string(),
            }
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        warn!(name: "acquire.download.status", url = %shown, status = status.as_u16(), "download rejected");
        return Err(AcquisitionError::Download {
            url: shown,
            reason: format!("HTTP {status}"),
        });
    }
    if response
        .content_length()
        .is_some_and(|len| len > config.max_bytes)
    {
        return Err(AcquisitionError::TooLarge {
            limit: config.max_bytes,
        });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let mut spool = spool_file(config.spool_dir.as_ref())?;
    let mut limited = response.take(config.max_bytes + 1);
    let copied = std::io::copy(&mut limited, spool.as_file_mut()).map_err(|e| {
        if is_timeout(&e) {
            AcquisitionError::Timeout {
                url: shown.clone(),
                secs: config.timeout_secs,
            }
        } else {
            AcquisitionError::Download {
                url: shown.clone(),
                reason: e.to_string(),
            }
        }
    })?;
    if copied > config.max_bytes {
        return Err(AcquisitionError::TooLarge {
            limit: config.max_bytes,
        });
    }
    if copied == 0 {
        return Err(AcquisitionError::Empty);
    }

    let file = spool.as_file_mut();
    let mut bytes = Vec::with_capacity(usize::try_from(copied).unwrap_or_default());
    file.seek(SeekFrom::Start(0))
        .and_then(|_| file.read_to_end(&mut bytes))
        .map_err(|e| AcquisitionError::Spool(e.to_string()))?;

    debug!(
        name: "acquire.download",
        url = %shown,
        bytes = bytes.len(),
        spool = %spool.path().display(),
        "downloaded document"
    );

    let filename = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(str::to_string);

    Ok(AcquiredDocument {
        bytes,
        locator: SourceLocator::Remote { url: shown },
        filename,
        content_type,
        spool: Some(spool),
    })
}

/// URL without credentials or query string, for logs and reports.
fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    let _ = shown.set_username("");
    let _ = shown.set_password(None);
    shown.set_query(None);
    shown.to_string()
}

fn is_timeout(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::TimedOut
        || err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
            .is_some_and(reqwest::Error::is_timeout)
}
