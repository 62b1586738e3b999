//! Handlers backed by HTTP collaborators. Every endpoint here is a narrow
//! contract: the handler validates its argument, consults any required
//! environment key lazily, stores the structured result in memory, and
//! lets the hybrid rules decide how it surfaces.

use base64::Engine;
use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;

use crate::commands::handlers::{finish_hybrid, require_arg, require_env, user_error};
use crate::commands::HandlerOutcome;
use crate::core::kernel::Kernel;
use crate::ui::pager;
use crate::utils::text::strip_html;
use crate::utils::url::looks_like_url;
use crate::BoxError;

type HandlerResult = Result<HandlerOutcome, BoxError>;

const USER_AGENT: &str = concat!("symbiote/", env!("CARGO_PKG_VERSION"));
const PAGE_CAP: usize = 100_000;

fn truncate_at_boundary(text: &mut String, cap: usize) {
    if text.len() <= cap {
        return;
    }
    let mut cut = cap;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

/// Fetch a URL as readable text, stripping markup from HTML bodies.
pub(super) async fn fetch_text(kernel: &Kernel, url: &str) -> Result<String, BoxError> {
    let response = kernel
        .http
        .get(url)
        .header("User-Agent", USER_AGENT)
        .send()
        .await?
        .error_for_status()?;
    let html_like = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("html"))
        .unwrap_or(false);
    let body = response.text().await?;
    let mut text = if html_like || body.trim_start().starts_with('<') {
        strip_html(&body)
    } else {
        body
    };
    truncate_at_boundary(&mut text, PAGE_CAP);
    Ok(text)
}

pub(super) async fn get(kernel: &mut Kernel, arg: Option<&str>, standalone: bool) -> HandlerResult {
    let url = require_arg(arg, "get:url:")?.trim().to_string();
    if !looks_like_url(&url) {
        return user_error(kernel, &format!("'{url}' is not an http(s) URL"));
    }
    let content = fetch_text(kernel, &url).await?;
    kernel
        .memory
        .create("get_command", json!({"url": url, "content": content}));
    let title = format!("GET {url}");
    finish_hybrid(kernel, standalone, &title, &content, content.clone())
}

fn href_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r##"href="(https?://[^"\s]+)""##).unwrap())
}

const CRAWL_LINK_LIMIT: usize = 5;
const CRAWL_PAGE_CAP: usize = 4_000;

pub(super) async fn crawl(
    kernel: &mut Kernel,
    arg: Option<&str>,
    standalone: bool,
) -> HandlerResult {
    let url = require_arg(arg, "crawl:url:")?.trim().to_string();
    if !looks_like_url(&url) {
        return user_error(kernel, &format!("'{url}' is not an http(s) URL"));
    }
    let body = kernel
        .http
        .get(&url)
        .header("User-Agent", USER_AGENT)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let root_host = url.split('/').nth(2).unwrap_or_default().to_string();
    let mut links: Vec<String> = Vec::new();
    for caps in href_re().captures_iter(&body) {
        let link = caps[1].to_string();
        if link.split('/').nth(2) == Some(root_host.as_str()) && !links.contains(&link) {
            links.push(link);
            if links.len() >= CRAWL_LINK_LIMIT {
                break;
            }
        }
    }

    let mut pages = vec![json!({"url": url, "content": strip_html(&body)})];
    let mut combined = strip_html(&body);
    for link in &links {
        match fetch_text(kernel, link).await {
            Ok(mut text) => {
                truncate_at_boundary(&mut text, CRAWL_PAGE_CAP);
                combined.push_str("\n\n");
                combined.push_str(&text);
                pages.push(json!({"url": link, "content": text}));
            }
            Err(e) => tracing::warn!(url = %link, error = %e, "crawl page skipped"),
        }
    }
    kernel
        .memory
        .create("crawl_command", json!({"url": url, "pages": pages}));
    let title = format!("Crawl {url} ({} pages)", pages.len());
    finish_hybrid(kernel, standalone, &title, &combined, combined.clone())
}

pub(super) async fn w3m(kernel: &mut Kernel, arg: Option<&str>) -> HandlerResult {
    let url = require_arg(arg, "w3m:url:")?.trim().to_string();
    if !looks_like_url(&url) {
        return user_error(kernel, &format!("'{url}' is not an http(s) URL"));
    }
    let text = fetch_text(kernel, &url).await?;
    if !kernel.renderer.quiet {
        pager::page(&url, &text)?;
    }
    Ok(HandlerOutcome::Done)
}

pub(super) async fn weather(
    kernel: &mut Kernel,
    arg: Option<&str>,
    standalone: bool,
) -> HandlerResult {
    let location = match arg {
        Some(location) => location.trim().to_string(),
        None => kernel.settings.location.clone(),
    };
    if location.is_empty() {
        return user_error(kernel, "no location; use weather:postal: or set location");
    }
    let report: Value = kernel
        .http
        .get(format!("https://wttr.in/{location}"))
        .query(&[("format", "j1")])
        .header("User-Agent", USER_AGENT)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let summary = summarize_weather(&report, &location);
    kernel.memory.create("weather_command", report);
    let title = format!("Weather: {location}");
    finish_hybrid(kernel, standalone, &title, &summary, summary.clone())
}

fn summarize_weather(report: &Value, location: &str) -> String {
    let current = &report["current_condition"][0];
    let description = current["weatherDesc"][0]["value"].as_str().unwrap_or("unknown");
    let temp_f = current["temp_F"].as_str().unwrap_or("?");
    let temp_c = current["temp_C"].as_str().unwrap_or("?");
    let humidity = current["humidity"].as_str().unwrap_or("?");
    let wind = current["windspeedMiles"].as_str().unwrap_or("?");
    format!(
        "Weather for {location}: {description}, {temp_f}°F ({temp_c}°C), \
         humidity {humidity}%, wind {wind} mph"
    )
}

pub(super) async fn getip(kernel: &mut Kernel, standalone: bool) -> HandlerResult {
    let ip = kernel
        .http
        .get("https://ifconfig.me/ip")
        .header("User-Agent", USER_AGENT)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?
        .trim()
        .to_string();
    kernel.memory.create("getip_command", json!({"ip": ip}));
    finish_hybrid(kernel, standalone, "Public IP", &ip, ip.clone())
}

pub(super) async fn google(
    kernel: &mut Kernel,
    arg: Option<&str>,
    standalone: bool,
) -> HandlerResult {
    let query = require_arg(arg, "google:query:")?.trim().to_string();
    let api_key = match require_env("GOOGLE_API_KEY") {
        Ok(key) => key,
        Err(e) => return user_error(kernel, &e.to_string()),
    };
    let cse_id = match require_env("GOOGLE_CSE_ID") {
        Ok(id) => id,
        Err(e) => return user_error(kernel, &e.to_string()),
    };
    let results: Value = kernel
        .http
        .get("https://www.googleapis.com/customsearch/v1")
        .query(&[
            ("key", api_key.as_str()),
            ("cx", cse_id.as_str()),
            ("q", query.as_str()),
        ])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let mut listing = String::new();
    let mut stored = Vec::new();
    if let Some(items) = results["items"].as_array() {
        for item in items.iter().take(8) {
            let title = item["title"].as_str().unwrap_or("");
            let link = item["link"].as_str().unwrap_or("");
            let snippet = item["snippet"].as_str().unwrap_or("");
            listing.push_str(&format!("{title}\n  {link}\n  {snippet}\n\n"));
            stored.push(json!({"title": title, "link": link, "snippet": snippet}));
        }
    }
    if stored.is_empty() {
        return user_error(kernel, &format!("no results for '{query}'"));
    }
    kernel
        .memory
        .create("google_command", json!({"query": query, "results": stored}));
    let title = format!("Google: {query}");
    let trimmed = listing.trim_end().to_string();
    finish_hybrid(kernel, standalone, &title, &trimmed, trimmed.clone())
}

pub(super) async fn wiki(kernel: &mut Kernel, arg: Option<&str>, standalone: bool) -> HandlerResult {
    let topic = require_arg(arg, "wiki:topic:")?.trim().replace(' ', "_");
    let summary: Value = kernel
        .http
        .get(format!(
            "https://en.wikipedia.org/api/rest_v1/page/summary/{topic}"
        ))
        .header("User-Agent", USER_AGENT)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let extract = summary["extract"].as_str().unwrap_or_default().to_string();
    if extract.is_empty() {
        return user_error(kernel, &format!("no wikipedia summary for '{topic}'"));
    }
    kernel.memory.create("wiki_command", summary.clone());
    let title = format!(
        "Wikipedia: {}",
        summary["title"].as_str().unwrap_or(&topic)
    );
    finish_hybrid(kernel, standalone, &title, &extract, extract.clone())
}

fn rss_title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<title>(?:<!\[CDATA\[)?([^<\]]+)").unwrap())
}

pub(super) async fn news(kernel: &mut Kernel, arg: Option<&str>, standalone: bool) -> HandlerResult {
    let feed_url = match arg {
        Some(topic) => format!(
            "https://news.google.com/rss/search?q={}",
            topic.trim().replace(' ', "+")
        ),
        None => "https://news.google.com/rss".to_string(),
    };
    let body = kernel
        .http
        .get(&feed_url)
        .header("User-Agent", USER_AGENT)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    // First <title> is the feed's own name
    let headlines: Vec<String> = rss_title_re()
        .captures_iter(&body)
        .skip(1)
        .take(10)
        .map(|caps| caps[1].trim().to_string())
        .collect();
    if headlines.is_empty() {
        return user_error(kernel, "the feed returned no headlines");
    }
    kernel
        .memory
        .create("news_command", json!(headlines));
    let listing = headlines
        .iter()
        .map(|h| format!("• {h}"))
        .collect::<Vec<_>>()
        .join("\n");
    finish_hybrid(kernel, standalone, "Headlines", &listing, listing.clone())
}

pub(super) async fn define(
    kernel: &mut Kernel,
    arg: Option<&str>,
    standalone: bool,
) -> HandlerResult {
    let word = require_arg(arg, "define:word:")?.trim().to_lowercase();
    let entries: Value = kernel
        .http
        .get(format!(
            "https://api.dictionaryapi.dev/api/v2/entries/en/{word}"
        ))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let mut listing = String::new();
    if let Some(meanings) = entries[0]["meanings"].as_array() {
        for meaning in meanings {
            let part = meaning["partOfSpeech"].as_str().unwrap_or("");
            if let Some(definition) = meaning["definitions"][0]["definition"].as_str() {
                listing.push_str(&format!("{part}: {definition}\n"));
            }
        }
    }
    if listing.is_empty() {
        return user_error(kernel, &format!("no definition found for '{word}'"));
    }
    kernel
        .memory
        .create("define_command", json!({"word": word, "entries": entries}));
    let title = format!("Define: {word}");
    let trimmed = listing.trim_end().to_string();
    finish_hybrid(kernel, standalone, &title, &trimmed, trimmed.clone())
}

pub(super) async fn mail(kernel: &mut Kernel, standalone: bool) -> HandlerResult {
    let username = kernel.settings.imap_username.clone();
    let password = kernel.settings.imap_password.clone();
    if username.is_empty() || password.is_empty() {
        return user_error(
            kernel,
            "set imap_username and imap_password to enable mail::",
        );
    }
    let host = match std::env::var("SYMBIOTE_IMAP_HOST") {
        Ok(host) => host,
        Err(_) => match username.split_once('@') {
            Some((_, domain)) => format!("imap.{domain}"),
            None => return user_error(kernel, "imap_username is not an address; set SYMBIOTE_IMAP_HOST"),
        },
    };

    let subjects = tokio::task::spawn_blocking(move || -> Result<Vec<String>, BoxError> {
        let tls = native_tls::TlsConnector::builder().build()?;
        let client = imap::connect((host.as_str(), 993), &host, &tls)?;
        let mut session = client.login(&username, &password).map_err(|(e, _)| e)?;
        let mailbox = session.select("INBOX")?;
        let newest = mailbox.exists;
        if newest == 0 {
            session.logout()?;
            return Ok(Vec::new());
        }
        let oldest = newest.saturating_sub(9).max(1);
        let fetches = session.fetch(format!("{oldest}:{newest}"), "ENVELOPE")?;
        let mut subjects = Vec::new();
        for fetch in fetches.iter() {
            if let Some(envelope) = fetch.envelope() {
                let subject = envelope
                    .subject
                    .as_ref()
                    .map(|s| String::from_utf8_lossy(s).to_string())
                    .unwrap_or_else(|| "(no subject)".to_string());
                subjects.push(subject);
            }
        }
        session.logout()?;
        Ok(subjects)
    })
    .await??;

    if subjects.is_empty() {
        return user_error(kernel, "the inbox is empty");
    }
    kernel.memory.create("mail_command", json!(subjects));
    let listing = subjects
        .iter()
        .map(|s| format!("• {s}"))
        .collect::<Vec<_>>()
        .join("\n");
    finish_hybrid(kernel, standalone, "Inbox", &listing, listing.clone())
}

fn caption_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""captionTracks":\[\{"baseUrl":"([^"]+)""#).unwrap())
}

pub(super) async fn yt_transcript(
    kernel: &mut Kernel,
    arg: Option<&str>,
    standalone: bool,
) -> HandlerResult {
    let target = require_arg(arg, "yt_transcript:url-or-id:")?.trim().to_string();
    let watch_url = if looks_like_url(&target) {
        target.clone()
    } else {
        format!("https://www.youtube.com/watch?v={target}")
    };
    let page = kernel
        .http
        .get(&watch_url)
        .header("User-Agent", USER_AGENT)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let Some(caps) = caption_re().captures(&page) else {
        return user_error(kernel, "no caption track on that video");
    };
    let caption_url = caps[1].replace("\\u0026", "&");
    let xml = kernel
        .http
        .get(&caption_url)
        .header("User-Agent", USER_AGENT)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    let transcript = strip_html(&xml);
    kernel.memory.create(
        "yt_transcript_command",
        json!({"url": watch_url, "transcript": transcript}),
    );
    finish_hybrid(kernel, standalone, "Transcript", &transcript, transcript.clone())
}

/// POST text to a hosted classification model and hand back its scores.
async fn hf_classify(kernel: &Kernel, model: &str, text: &str) -> Result<Value, BoxError> {
    let api_key = require_env("HUGGINGFACE_API_KEY")?;
    let scores: Value = kernel
        .http
        .post(format!("https://api-inference.huggingface.co/models/{model}"))
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&json!({"inputs": text}))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(scores)
}

pub(super) async fn fake_news(
    kernel: &mut Kernel,
    arg: Option<&str>,
    standalone: bool,
) -> HandlerResult {
    let text = require_arg(arg, "fake_news:text-or-url:")?.trim().to_string();
    let sample = if looks_like_url(&text) {
        fetch_text(kernel, &text).await?
    } else {
        text.clone()
    };
    let scores = match hf_classify(kernel, "hamzab/roberta-fake-news-classification", &sample).await
    {
        Ok(scores) => scores,
        Err(e) => return user_error(kernel, &e.to_string()),
    };
    let summary = serde_json::to_string_pretty(&scores)?;
    kernel
        .memory
        .create("fake_news_command", json!({"input": text, "scores": scores}));
    finish_hybrid(kernel, standalone, "Fake news score", &summary, summary.clone())
}

pub(super) async fn deception(
    kernel: &mut Kernel,
    arg: Option<&str>,
    standalone: bool,
) -> HandlerResult {
    let text = require_arg(arg, "deception:text:")?.trim().to_string();
    let scores = match hf_classify(kernel, "dlentr/lie_detection_distilbert", &text).await {
        Ok(scores) => scores,
        Err(e) => return user_error(kernel, &e.to_string()),
    };
    let summary = serde_json::to_string_pretty(&scores)?;
    kernel
        .memory
        .create("deception_command", json!({"input": text, "scores": scores}));
    finish_hybrid(kernel, standalone, "Deception score", &summary, summary.clone())
}

pub(super) async fn vscan(
    kernel: &mut Kernel,
    arg: Option<&str>,
    standalone: bool,
) -> HandlerResult {
    let url = require_arg(arg, "vscan:url:")?.trim().to_string();
    let api_key = match require_env("VIRUSTOTAL_API_KEY") {
        Ok(key) => key,
        Err(e) => return user_error(kernel, &e.to_string()),
    };
    let url_id = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&url);
    let report: Value = kernel
        .http
        .get(format!("https://www.virustotal.com/api/v3/urls/{url_id}"))
        .header("x-apikey", api_key)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let stats = &report["data"]["attributes"]["last_analysis_stats"];
    let summary = format!(
        "malicious {} | suspicious {} | harmless {} | undetected {}",
        stats["malicious"].as_i64().unwrap_or(0),
        stats["suspicious"].as_i64().unwrap_or(0),
        stats["harmless"].as_i64().unwrap_or(0),
        stats["undetected"].as_i64().unwrap_or(0),
    );
    kernel
        .memory
        .create("vscan_command", json!({"url": url, "report": report}));
    let title = format!("VirusTotal: {url}");
    finish_hybrid(kernel, standalone, &title, &summary, summary.clone())
}

pub(super) async fn image_extract(
    kernel: &mut Kernel,
    arg: Option<&str>,
    standalone: bool,
) -> HandlerResult {
    let target = require_arg(arg, "image_extract:path-or-url:")?.trim().to_string();
    let api_key = match require_env("HUGGINGFACE_API_KEY") {
        Ok(key) => key,
        Err(e) => return user_error(kernel, &e.to_string()),
    };
    let bytes: Vec<u8> = if looks_like_url(&target) {
        kernel
            .http
            .get(&target)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?
            .to_vec()
    } else {
        std::fs::read(&target)?
    };
    let result: Value = kernel
        .http
        .post("https://api-inference.huggingface.co/models/microsoft/trocr-base-printed")
        .header("Authorization", format!("Bearer {api_key}"))
        .body(bytes)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let text = result[0]["generated_text"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    if text.is_empty() {
        return user_error(kernel, "no text recognized in that image");
    }
    kernel
        .memory
        .create("image_extract_command", json!({"source": target, "text": text}));
    finish_hybrid(kernel, standalone, "OCR", &text, text.clone())
}

pub(super) async fn analyze_image(
    kernel: &mut Kernel,
    arg: Option<&str>,
    standalone: bool,
) -> HandlerResult {
    let target = require_arg(arg, "analyze_image:path-or-url:")?.trim().to_string();
    let api_key = match require_env("OPENAI_API_KEY") {
        Ok(key) => key,
        Err(e) => return user_error(kernel, &e.to_string()),
    };
    let image_url = if looks_like_url(&target) {
        target.clone()
    } else {
        let bytes = std::fs::read(&target)?;
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        )
    };
    let body = json!({
        "model": "gpt-4o",
        "messages": [{
            "role": "user",
            "content": [
                {"type": "text", "text": "Describe this image in detail."},
                {"type": "image_url", "image_url": {"url": image_url}}
            ]
        }]
    });
    let response: Value = kernel
        .http
        .post("https://api.openai.com/v1/chat/completions")
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&body)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let description = response["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    if description.is_empty() {
        return user_error(kernel, "the vision model returned nothing");
    }
    kernel.memory.create(
        "analyze_image_command",
        json!({"source": target, "description": description}),
    );
    finish_hybrid(kernel, standalone, "Image analysis", &description, description.clone())
}

pub(super) async fn image(kernel: &mut Kernel, arg: Option<&str>) -> HandlerResult {
    let prompt = require_arg(arg, "image:prompt:")?.trim().to_string();
    let api_key = match require_env("OPENAI_API_KEY") {
        Ok(key) => key,
        Err(e) => return user_error(kernel, &e.to_string()),
    };
    let body = json!({
        "model": "gpt-image-1",
        "prompt": prompt,
        "n": 1,
        "size": "1024x1024"
    });
    let response: Value = kernel
        .http
        .post("https://api.openai.com/v1/images/generations")
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&body)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let Some(b64) = response["data"][0]["b64_json"].as_str() else {
        return user_error(kernel, "the image endpoint returned no data");
    };
    let bytes = base64::engine::general_purpose::STANDARD.decode(b64)?;
    let dir = kernel.settings.symbiote_path.join("images");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(format!("image-{}.png", chrono::Utc::now().timestamp()));
    std::fs::write(&path, bytes)?;
    kernel
        .renderer
        .info(&format!("Image written to {}", path.display()));
    Ok(HandlerOutcome::Done)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weather_summary_reads_wttr_shape() {
        let report = json!({
            "current_condition": [{
                "weatherDesc": [{"value": "Partly cloudy"}],
                "temp_F": "84",
                "temp_C": "29",
                "humidity": "70",
                "windspeedMiles": "12"
            }]
        });
        let summary = summarize_weather(&report, "33004");
        assert!(summary.contains("Partly cloudy"));
        assert!(summary.contains("84°F"));
        assert!(summary.contains("33004"));
    }

    #[test]
    fn rss_titles_parse_with_and_without_cdata() {
        let feed = "<rss><channel><title>Feed</title>\
                    <item><title>First headline</title></item>\
                    <item><title><![CDATA[Second headline]]></title></item>\
                    </channel></rss>";
        let titles: Vec<String> = rss_title_re()
            .captures_iter(feed)
            .skip(1)
            .map(|c| c[1].trim().to_string())
            .collect();
        assert_eq!(titles, vec!["First headline", "Second headline"]);
    }

    #[test]
    fn caption_track_url_is_extracted() {
        let page = r#"stuff "captionTracks":[{"baseUrl":"https://yt/api?v=1&lang=en","x":1}] more"#;
        let caps = caption_re().captures(page).unwrap();
        assert_eq!(
            caps[1].replace("\\u0026", "&"),
            "https://yt/api?v=1&lang=en"
        );
    }
}
