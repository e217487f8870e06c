//! Record extraction from a parsed listing page.
//!
//! Each listing item is a container carrying [`ITEM_CLASS`]. Inside it, links
//! to detail pages (`href` starting with [`DETAIL_PATH_PREFIX`]) come as an
//! image link followed by the title link; the title link's path segment after
//! the prefix is the record's `source_id`. Year, runtime, genre and (in ranked
//! mode) rank are read from `span`s with fixed classes and may be absent.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, SubsecRound, Utc};
use rankcrawl_core::Record;
use regex::Regex;

use crate::error::ExtractionSkip;
use crate::markup::{Document, Node};
use crate::sanitize::{sanitize_rank, sanitize_text};

/// Container class of one listing entry in "advanced" display mode.
pub const ITEM_CLASS: &str = "lister-item mode-advanced";
/// Path prefix shared by every detail-page link.
pub const DETAIL_PATH_PREFIX: &str = "/title/";

const YEAR_CLASS: &str = "lister-item-year";
const RUNTIME_CLASS: &str = "runtime";
const GENRE_CLASS: &str = "genre";
const INDEX_CLASS: &str = "lister-item-index";

static DETAIL_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^/title/").expect("valid detail link regex"));

/// Turns listing pages into [`Record`]s.
#[derive(Debug, Clone, Default)]
pub struct RecordExtractor {
    rank_label: Option<String>,
}

impl RecordExtractor {
    /// `rank_label` switches on ranked mode: every record is tagged with the
    /// label and `rank` is read from the item's index tag.
    #[must_use]
    pub fn new(rank_label: Option<String>) -> Self {
        Self { rank_label }
    }

    #[must_use]
    pub fn is_ranked(&self) -> bool {
        self.rank_label.is_some()
    }

    /// Extracts every listing item on `page`, stamped with the current time.
    #[must_use]
    pub fn extract(&self, page: &Document) -> Vec<Record> {
        self.extract_at(page, Utc::now().trunc_subsecs(6))
    }

    /// Extracts every listing item on `page`, all stamped with `collected_at`.
    ///
    /// Items without the mandatory link structure, or repeating a
    /// `source_id` already seen on this page, are skipped with a warning.
    /// A page with no listing items yields an empty vector.
    #[must_use]
    pub fn extract_at(&self, page: &Document, collected_at: DateTime<Utc>) -> Vec<Record> {
        let items = page.root().find_all_by_class(ITEM_CLASS);
        let mut seen: HashSet<String> = HashSet::with_capacity(items.len());
        let mut records = Vec::with_capacity(items.len());

        for (index, item) in items.into_iter().enumerate() {
            let outcome = self.extract_item(item, collected_at).and_then(|record| {
                if seen.insert(record.source_id.clone()) {
                    Ok(record)
                } else {
                    Err(ExtractionSkip::DuplicateSourceId {
                        source_id: record.source_id,
                    })
                }
            });

            match outcome {
                Ok(record) => records.push(record),
                Err(skip) => {
                    tracing::warn!(item = index, reason = %skip, "skipping listing item");
                }
            }
        }

        tracing::debug!(records = records.len(), "extracted listing items");
        records
    }

    fn extract_item(
        &self,
        item: Node<'_>,
        collected_at: DateTime<Utc>,
    ) -> Result<Record, ExtractionSkip> {
        let links = item.find_all_by_tag_and_attr("a", "href", &DETAIL_LINK);
        let Some(title_link) = links.get(1) else {
            return Err(ExtractionSkip::MissingLinks { found: links.len() });
        };

        let href = title_link.attr("href").unwrap_or_default();
        let source_id = source_id_from_href(href).ok_or_else(|| ExtractionSkip::EmptySourceId {
            href: href.to_owned(),
        })?;

        let title = title_link.text().trim().to_owned();
        if title.is_empty() {
            return Err(ExtractionSkip::EmptyTitle { source_id });
        }

        let field = |class: &str| {
            item.find_first_by_tag_and_class("span", class)
                .map(|node| sanitize_text(&node.text()))
                .unwrap_or_default()
        };

        let rank = if self.is_ranked() {
            item.find_first_by_tag_and_class("span", INDEX_CLASS)
                .and_then(|node| sanitize_rank(&node.text()))
        } else {
            None
        };

        Ok(Record {
            source_id,
            title,
            rank,
            rank_label: self.rank_label.clone(),
            year: field(YEAR_CLASS),
            duration_minutes: field(RUNTIME_CLASS),
            genres: field(GENRE_CLASS),
            collected_at,
        })
    }
}

/// `"/title/tt0111161/?ref_=adv_li_tt"` → `"tt0111161"`.
fn source_id_from_href(href: &str) -> Option<String> {
    let rest = href.strip_prefix(DETAIL_PATH_PREFIX)?;
    let segment = rest.split(['/', '?', '#']).next().unwrap_or_default();
    (!segment.is_empty()).then(|| segment.to_owned())
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
