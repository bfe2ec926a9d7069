//! Dashboard metrics derived from the cache

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::cache::LocalCache;
use crate::core::filter::recent_items;
use crate::core::record::Item;

/// Items shown in the recent list
pub const RECENT_LIMIT: usize = 5;

/// Categories shown in the breakdown
pub const CATEGORY_LIMIT: usize = 5;

/// Bucket for items without a category
pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecentItem {
    pub id: String,
    pub heading: Option<String>,
    pub building: Option<String>,
    pub category: Option<String>,
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryCount {
    pub name: String,
    pub count: usize,
    /// Count relative to the largest category, in 0..=1
    pub share: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DashboardMetrics {
    pub total_items: usize,
    pub lost_items: usize,
    pub found_items: usize,
    pub total_users: usize,
    pub recent: Vec<RecentItem>,
    pub categories: Vec<CategoryCount>,
}

pub fn dashboard(cache: &LocalCache) -> DashboardMetrics {
    let items = cache.items.records();
    let lost_items = items.iter().filter(|i| i.is_lost()).count();

    DashboardMetrics {
        total_items: items.len(),
        lost_items,
        found_items: items.len() - lost_items,
        total_users: cache.users.len(),
        recent: recent_items(items, RECENT_LIMIT)
            .into_iter()
            .map(|item| RecentItem {
                id: item.id.clone(),
                heading: item.heading().map(str::to_string),
                building: item.building.clone(),
                category: item.category_name.clone(),
                status: item.status_label(),
                timestamp: item.effective_timestamp(),
            })
            .collect(),
        categories: category_counts(items, CATEGORY_LIMIT),
    }
}

/// Largest categories first; equal counts keep first-seen order
pub fn category_counts(items: &[Item], limit: usize) -> Vec<CategoryCount> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for item in items {
        let name = item.category_name.as_deref().unwrap_or(UNCATEGORIZED);
        match counts.iter_mut().find(|(n, _)| n.as_str() == name) {
            Some((_, count)) => *count += 1,
            None => counts.push((name.to_string(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(limit);

    let max = counts.first().map_or(0, |(_, c)| *c);
    counts
        .into_iter()
        .map(|(name, count)| CategoryCount {
            name,
            count,
            share: if max == 0 { 0.0 } else { count as f64 / max as f64 },
        })
        .collect()
}
