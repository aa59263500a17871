//! yt-dlp argument lists.

use super::DownloadRequest;
use crate::config::DeliveryMode;

/// `<uploader>/<date>_<title>_[<id>].<ext>`; the bracketed id is what the
/// output scan looks for.
pub const OUTPUT_TEMPLATE: &str = "%(uploader)s/%(upload_date)s_%(title).200B_[%(id)s].%(ext)s";

/// Format selector for a quality label. Fragmented delivery restricts every
/// alternative to HLS formats.
pub fn select_format(quality: &str, delivery: DeliveryMode) -> String {
    let height = match quality.trim().to_ascii_lowercase().as_str() {
        "1080p" | "1080" | "hd" => Some(1080),
        "720p" | "720" | "sd" | "small" => Some(720),
        _ => None,
    };
    let cap = height.map(|h| format!("[height<={}]", h)).unwrap_or_default();
    match delivery {
        DeliveryMode::Auto => format!("bv*{cap}+ba/b{cap}"),
        DeliveryMode::Fragmented => {
            let hls = "[protocol*=m3u8]";
            format!("bv*{hls}{cap}+ba{hls}/b{hls}{cap}")
        }
    }
}

/// Expand the subtitle language shorthand: empty, `en` or `english` mean all
/// English tracks; `all` means every track. Live chat is always excluded.
pub fn normalize_sub_langs(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "en" | "english" => "en.*,en,-live_chat".to_string(),
        "all" => "all,-live_chat".to_string(),
        _ => raw.trim().to_string(),
    }
}

fn common_args(req: &DownloadRequest, args: &mut Vec<String>) {
    if let Some(file) = &req.cookies.file {
        args.push("--cookies".into());
        args.push(file.display().to_string());
    } else if let Some(browser) = req.cookies.from_browser.as_deref().filter(|b| !b.is_empty()) {
        args.push("--cookies-from-browser".into());
        args.push(browser.to_string());
    }
    if let Some(proxy) = req.proxy.as_deref().filter(|p| !p.is_empty()) {
        args.push("--proxy".into());
        args.push(proxy.to_string());
    }
}

pub fn download_args(req: &DownloadRequest) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--no-playlist".into(),
        "--newline".into(),
        "--restrict-filenames".into(),
        "-N".into(),
        req.fragments.max(1).to_string(),
        "-P".into(),
        req.output_dir.display().to_string(),
        "-o".into(),
        OUTPUT_TEMPLATE.into(),
    ];
    if req.delivery_mode == DeliveryMode::Fragmented {
        args.push("--hls-prefer-native".into());
        args.push("--downloader".into());
        args.push("m3u8:native".into());
    }
    args.push("-f".into());
    args.push(select_format(&req.quality, req.delivery_mode));
    if let Some(archive) = &req.archive_path {
        args.push("--download-archive".into());
        args.push(archive.display().to_string());
    }
    if let Some(limit) = req.rate_limit_mbps.filter(|l| *l > 0.0) {
        args.push("--limit-rate".into());
        args.push(format!("{}M", limit));
    }
    common_args(req, &mut args);
    args.push(req.item_url.clone());
    args
}

pub fn subtitle_args(req: &DownloadRequest) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--no-playlist".into(),
        "--newline".into(),
        "--restrict-filenames".into(),
        "--skip-download".into(),
        "--write-subs".into(),
        "--write-auto-subs".into(),
        "--sub-langs".into(),
        normalize_sub_langs(&req.sub_langs),
        "--convert-subs".into(),
        "vtt".into(),
        "-P".into(),
        req.output_dir.display().to_string(),
        "-o".into(),
        OUTPUT_TEMPLATE.into(),
    ];
    common_args(req, &mut args);
    args.push(req.item_url.clone());
    args
}
