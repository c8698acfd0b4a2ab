use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::classify;
use crate::config::Settings;
use crate::db;
use crate::deepgram::DeepgramClient;
use crate::extract;
use crate::gemini::GeminiClient;

/// Everything the pipeline needs to talk to the outside world, built once
/// at process entry.
pub struct PipelineContext {
    pub settings: Settings,
    pub http: reqwest::Client,
    pub deepgram: DeepgramClient,
    pub gemini: GeminiClient,
}

impl PipelineContext {
    pub fn new(settings: Settings) -> Result<Self> {
        // Short timeout on resource fetches only; backend calls rely on the
        // backends' own timeout behavior.
        let fetch_client = reqwest::Client::builder()
            .timeout(settings.fetch_timeout)
            .build()?;
        let backend_client = reqwest::Client::new();
        let deepgram = DeepgramClient::new(&settings, backend_client.clone());
        let gemini = GeminiClient::new(&settings, backend_client);
        Ok(PipelineContext {
            settings,
            http: fetch_client,
            deepgram,
            gemini,
        })
    }
}

pub struct BatchStats {
    pub total: usize,
    pub tagged: usize,
    pub skipped: usize,
}

impl BatchStats {
    pub fn print(&self) {
        println!(
            "Done: {} resources ({} tagged, {} skipped).",
            self.total, self.tagged, self.skipped
        );
    }
}

/// Process a batch of resources, one at a time: extract content, persist
/// the transcript, classify, assign tags. Every per-resource failure is
/// isolated; the batch always runs to the end.
pub async fn run_batch(
    ctx: &PipelineContext,
    conn: &Connection,
    resources: Vec<db::Resource>,
) -> Result<BatchStats> {
    let total = resources.len();
    info!("starting AI tagging for {} resources", total);

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({eta})")?
            .progress_chars("=> "),
    );

    let mut tagged = 0usize;
    let mut skipped = 0usize;

    for resource in resources {
        info!("processing resource {} - {}", resource.id, resource.url);

        let extracted =
            extract::extract(&ctx.settings, &ctx.http, &ctx.deepgram, conn, &resource.url, resource.id)
                .await;

        let Some(text) = extracted else {
            warn!("no content extracted for resource {}, skipping", resource.id);
            skipped += 1;
            pb.inc(1);
            continue;
        };
        info!("extracted {} characters from resource {}", text.len(), resource.id);

        let Some(tags) = resolve_tags(&ctx.gemini, conn, &resource.url, &text).await else {
            skipped += 1;
            pb.inc(1);
            continue;
        };
        if tags.is_empty() {
            warn!("no tags generated for resource {}", resource.id);
            skipped += 1;
            pb.inc(1);
            continue;
        }

        assign_tags(conn, resource.id, &tags)?;
        info!("tags assigned to resource {}: {:?}", resource.id, tags);
        tagged += 1;
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(BatchStats {
        total,
        tagged,
        skipped,
    })
}

/// Classify one resource, degrading any classification error to `None` so
/// a bad vocabulary read never aborts the rest of the batch.
async fn resolve_tags(
    gemini: &GeminiClient,
    conn: &Connection,
    url: &str,
    extracted: &str,
) -> Option<Vec<String>> {
    match classify::classify(gemini, conn, url, Some(extracted)).await {
        Ok(tags) => Some(tags),
        Err(e) => {
            warn!("classification failed for {}: {}", url, e);
            None
        }
    }
}

/// Link every tag to the resource, creating tag rows that do not exist yet
/// (the vocabulary is append-only). Link inserts carry no duplicate guard.
fn assign_tags(conn: &Connection, resource_id: i64, tags: &[String]) -> Result<()> {
    for name in tags {
        let tag_id = match db::find_tag_id(conn, name)? {
            Some(id) => id,
            None => {
                info!("new tag detected: '{}' - adding to vocabulary", name);
                db::insert_tag(conn, name)?
            }
        };
        db::link_tag(conn, resource_id, tag_id)?;
    }
    Ok(())
}

// ── Tests ──
