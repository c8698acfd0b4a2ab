use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use tracing::{error, info, warn};

use super::embedded::is_protected;
use super::media::{self, is_media_url};
use crate::config::Settings;
use crate::deepgram::DeepgramClient;
use crate::error::ExtractError;

/// Last-resort scan for pages whose media only appears after JavaScript
/// runs: render the page headlessly, then inspect the live DOM.
///
/// The browser session is scoped to this call and torn down on every exit
/// path. Driver errors never propagate — they surface as "no media found".
pub async fn render_and_find_media(
    settings: &Settings,
    deepgram: &DeepgramClient,
    resource_url: &str,
) -> Option<String> {
    match scan(settings, deepgram, resource_url).await {
        Ok(transcript) => transcript,
        Err(e) => {
            error!("rendered-media scan failed for {}: {}", resource_url, e);
            None
        }
    }
}

async fn scan(
    settings: &Settings,
    deepgram: &DeepgramClient,
    resource_url: &str,
) -> Result<Option<String>, ExtractError> {
    let (mut browser, mut handler) = Browser::launch(browser_config(settings)?)
        .await
        .map_err(|e| ExtractError::Browser(e.to_string()))?;

    let handler_task = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    });

    let result = scan_page(&browser, settings, deepgram, resource_url).await;

    // Teardown happens regardless of the scan outcome; browser processes
    // leak if not closed.
    if let Err(e) = browser.close().await {
        warn!("failed to close browser: {}", e);
    }
    let _ = browser.wait().await;
    handler_task.abort();

    result
}

fn browser_config(settings: &Settings) -> Result<BrowserConfig, ExtractError> {
    // Sandboxing is disabled for containerized execution.
    let mut builder = BrowserConfig::builder().no_sandbox().args(vec![
        "--disable-dev-shm-usage",
        "--disable-gpu",
        "--disable-extensions",
    ]);
    if let Some(chrome) = &settings.chrome_binary {
        builder = builder.chrome_executable(chrome);
    }
    builder.build().map_err(ExtractError::Browser)
}

async fn scan_page(
    browser: &Browser,
    settings: &Settings,
    deepgram: &DeepgramClient,
    resource_url: &str,
) -> Result<Option<String>, ExtractError> {
    let page = browser
        .new_page(resource_url)
        .await
        .map_err(|e| ExtractError::Browser(e.to_string()))?;
    let _ = page.wait_for_navigation().await;
    // Bounded wait for dynamic content to settle.
    tokio::time::sleep(settings.render_wait).await;

    let videos = page
        .find_elements("video")
        .await
        .map_err(|e| ExtractError::Browser(e.to_string()))?;
    info!("found {} <video> elements on {}", videos.len(), resource_url);

    let mut transcript = None;
    for video in &videos {
        let Ok(Some(src)) = video.attribute("src").await else {
            continue;
        };
        if src.is_empty() {
            continue;
        }
        if is_protected(&src) {
            warn!("skipping protection-marked video source: {}", src);
            continue;
        }
        if !is_media_url(&src) {
            warn!("skipping unsupported video source: {}", src);
            continue;
        }
        transcript = media::transcribe_media(deepgram, &src).await;
        break;
    }

    if transcript.is_none() {
        let iframes = page
            .find_elements("iframe")
            .await
            .map_err(|e| ExtractError::Browser(e.to_string()))?;
        info!("found {} <iframe> elements on {}", iframes.len(), resource_url);

        for iframe in &iframes {
            let Ok(Some(src)) = iframe.attribute("src").await else {
                continue;
            };
            if src.is_empty() {
                continue;
            }
            if is_protected(&src) {
                warn!("skipping protection-marked iframe source: {}", src);
                continue;
            }
            // Re-validates that the src is a direct media file; rendered
            // iframes pointing at generic pages yield None here.
            transcript = media::transcribe_embedded(deepgram, &src).await;
            break;
        }
    }

    Ok(transcript)
}
