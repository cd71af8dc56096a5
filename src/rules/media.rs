// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use scraper::Html;

use super::catalog::violation;
use super::dom::{describe, has_attr, select_all, selector};
use super::{PageSnapshot, RuleError, RuleEvaluator};
use crate::domain::models::category::RuleCategory;
use crate::domain::models::finding::NewFinding;

const CATEGORY: RuleCategory = RuleCategory::Media;

/// 多媒体评估器
#[derive(Debug, Default, Clone, Copy)]
pub struct MediaEvaluator;

impl RuleEvaluator for MediaEvaluator {
    fn category(&self) -> RuleCategory {
        CATEGORY
    }

    fn evaluate(&self, page: &PageSnapshot) -> Result<Vec<NewFinding>, RuleError> {
        let document = Html::parse_document(&page.html);
        let tracks = selector("track[kind]")?;
        let mut findings = Vec::new();

        for video in select_all(&document, "video")? {
            let captioned = video.select(&tracks).any(|t| {
                matches!(
                    t.value().attr("kind").map(|k| k.to_ascii_lowercase()).as_deref(),
                    Some("captions" | "subtitles")
                )
            });
            if !captioned {
                findings.push(violation(CATEGORY, "video-captions-missing", describe(&video))?);
            }
        }

        for media in select_all(&document, "video[autoplay], audio[autoplay]")? {
            if media.value().attr("muted").is_none() {
                findings.push(violation(CATEGORY, "media-autoplay-unmuted", describe(&media))?);
            }
        }

        for audio in select_all(&document, "audio")? {
            if audio.value().attr("controls").is_none() {
                findings.push(violation(CATEGORY, "audio-controls-missing", describe(&audio))?);
            }
        }

        for frame in select_all(&document, "iframe")? {
            if !has_attr(&frame, "title") {
                let location = frame
                    .value()
                    .attr("src")
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| describe(&frame));
                findings.push(violation(CATEGORY, "iframe-title-missing", location)?);
            }
        }

        Ok(findings)
    }
}
