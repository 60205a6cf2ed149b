use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{part_path, DownloadKind, DownloadStatus, DownloadTarget};
use crate::transport::http::ensure_success;
use crate::transport::{Encoding, HttpTransport, Method, RequestParts};
use crate::{Error, Result};

/// Fetch `parts.url` into `target`, publishing progress on `status`.
///
/// The body goes to `<name>.<id>.part` first and is renamed on success; any
/// failure or cancellation removes the partial file. The id keeps a cancelled
/// transfer from touching the file of the one that replaced it.
pub(crate) async fn run(
    transport: &HttpTransport,
    parts: &RequestParts,
    target: &DownloadTarget,
    kind: DownloadKind,
    id: u64,
    token: &CancellationToken,
    status: &watch::Sender<DownloadStatus>,
) -> Result<PathBuf> {
    let dest = target.resolve(&parts.url);
    let part = part_path(&dest, id);
    tokio::fs::create_dir_all(&target.dir).await?;

    let outcome = tokio::select! {
        biased;
        _ = token.cancelled() => Err(Error::Cancelled),
        r = fetch_to(transport, parts, target, kind, &part, status) => r,
    };

    match outcome {
        Ok(bytes) => {
            if let Err(e) = tokio::fs::rename(&part, &dest).await {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(e.into());
            }
            info!(url = %parts.url, path = %dest.display(), bytes, "download completed");
            Ok(dest)
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&part).await;
            Err(e)
        }
    }
}

async fn fetch_to(
    transport: &HttpTransport,
    parts: &RequestParts,
    target: &DownloadTarget,
    kind: DownloadKind,
    part: &Path,
    status: &watch::Sender<DownloadStatus>,
) -> Result<u64> {
    let read_timeout = transport.timeouts().read;
    let resp = match kind {
        // Streams only bound idle time between chunks.
        DownloadKind::Streamed => transport.send(parts, None).await?,
        DownloadKind::Buffered => {
            transport
                .send(parts, Some(transport.deadline_for(&parts.body)))
                .await?
        }
    };
    let resp = ensure_success(resp).await?;
    let total = resp.content_length();
    let report = |downloaded: u64| {
        status.send_replace(DownloadStatus::Progress { downloaded, total });
        if let Some(ref f) = target.on_progress {
            f(downloaded, total);
        }
    };

    let mut file = tokio::fs::File::create(part).await?;
    let written = match kind {
        DownloadKind::Buffered => {
            let body = resp.bytes().await?;
            file.write_all(&body).await?;
            report(body.len() as u64);
            body.len() as u64
        }
        DownloadKind::Streamed => {
            let mut stream = resp.bytes_stream();
            let mut downloaded = 0u64;
            loop {
                let next = tokio::time::timeout(read_timeout, stream.next())
                    .await
                    .map_err(|_| Error::Timeout {
                        message: format!("no data for {:?}", read_timeout),
                    })?;
                let Some(chunk) = next else { break };
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                downloaded += chunk.len() as u64;
                report(downloaded);
            }
            downloaded
        }
    };
    file.flush().await?;
    debug!(url = %parts.url, written, "download body written");
    Ok(written)
}

pub(crate) fn request_for(url: url::Url) -> RequestParts {
    RequestParts {
        method: Method::Get,
        url,
        headers: Vec::new(),
        body: Encoding::Empty,
    }
}
