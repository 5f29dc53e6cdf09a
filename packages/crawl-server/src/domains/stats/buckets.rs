//! Page buckets reported by the stats endpoint.
//!
//! Each bucket is a union of filter entries, built from the same typed
//! conditions user filters parse into. PostgreSQL turns them into
//! `COUNT(*) FILTER (WHERE ...)` columns and the in-memory store evaluates
//! them row by row, so the two never disagree on what a bucket means.

use serde::{Deserialize, Serialize};

use crate::domains::filters::{Column, Condition, FilterEntry, FilterGroup, FilterValue, Operator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Ok,
    Warning,
    Error,
    Redirection,
    Level1,
    Level2,
    Level3,
    Level4,
    SuccessPages,
    RedirectPages,
    ClientErrorPages,
    ServerErrorPages,
}

impl Bucket {
    pub const ALL: [Bucket; 12] = [
        Bucket::Ok,
        Bucket::Warning,
        Bucket::Error,
        Bucket::Redirection,
        Bucket::Level1,
        Bucket::Level2,
        Bucket::Level3,
        Bucket::Level4,
        Bucket::SuccessPages,
        Bucket::RedirectPages,
        Bucket::ClientErrorPages,
        Bucket::ServerErrorPages,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Bucket::Ok => "ok",
            Bucket::Warning => "warning",
            Bucket::Error => "error",
            Bucket::Redirection => "redirection",
            Bucket::Level1 => "level1",
            Bucket::Level2 => "level2",
            Bucket::Level3 => "level3",
            Bucket::Level4 => "level4",
            Bucket::SuccessPages => "success_pages",
            Bucket::RedirectPages => "redirect_pages",
            Bucket::ClientErrorPages => "client_error_pages",
            Bucket::ServerErrorPages => "server_error_pages",
        }
    }

    /// A page falls in the bucket when any entry matches.
    pub fn entries(self) -> Vec<FilterEntry> {
        const RESPONSE_CODE: &str = "response_code";

        match self {
            Bucket::Ok => vec![group(vec![
                cond(RESPONSE_CODE, Operator::Gte, FilterValue::integer(200)),
                cond(RESPONSE_CODE, Operator::Lte, FilterValue::integer(299)),
                cond("redirect_code", Operator::IsNull, FilterValue::Null),
            ])],
            Bucket::Warning => ["og_title", "og_description"]
                .into_iter()
                .flat_map(|column| {
                    [
                        group(vec![cond(column, Operator::IsNull, FilterValue::Null)]),
                        group(vec![cond(column, Operator::Eq, FilterValue::text(""))]),
                    ]
                })
                .collect(),
            Bucket::Error => vec![response_range(400, Some(599))],
            Bucket::Redirection => vec![group(vec![cond(
                "redirect_code",
                Operator::In,
                FilterValue::integers(&[301, 302, 307, 308]),
            )])],
            Bucket::Level1 => vec![depth(1)],
            Bucket::Level2 => vec![depth(2)],
            Bucket::Level3 => vec![depth(3)],
            Bucket::Level4 => vec![depth(4)],
            Bucket::SuccessPages => vec![response_range(200, Some(299))],
            Bucket::RedirectPages => vec![response_range(300, Some(399))],
            Bucket::ClientErrorPages => vec![response_range(400, Some(499))],
            Bucket::ServerErrorPages => vec![response_range(500, None)],
        }
    }
}

// Bucket literals are fixed shapes that Condition::new always accepts
fn cond(column: &'static str, operator: Operator, value: FilterValue) -> Condition {
    Condition {
        column: Column::known(column),
        operator,
        value,
    }
}

fn group(conditions: Vec<Condition>) -> FilterEntry {
    FilterEntry::Group(FilterGroup::new(conditions))
}

fn depth(level: i64) -> FilterEntry {
    group(vec![cond("depth", Operator::Eq, FilterValue::integer(level))])
}

fn response_range(min: i64, max: Option<i64>) -> FilterEntry {
    let mut conditions = vec![cond("response_code", Operator::Gte, FilterValue::integer(min))];
    if let Some(max) = max {
        conditions.push(cond("response_code", Operator::Lte, FilterValue::integer(max)));
    }
    group(conditions)
}

/// Page counts per bucket for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageBuckets {
    pub total: i64,
    pub ok: i64,
    pub warning: i64,
    pub error: i64,
    pub redirection: i64,
    pub level1: i64,
    pub level2: i64,
    pub level3: i64,
    pub level4: i64,
    pub success_pages: i64,
    pub redirect_pages: i64,
    pub client_error_pages: i64,
    pub server_error_pages: i64,
}

impl PageBuckets {
    /// Zip a store result (`total` plus one count per `Bucket::ALL` entry).
    pub fn from_counts(total: i64, counts: &[i64]) -> Self {
        let mut buckets = PageBuckets {
            total,
            ..Default::default()
        };
        for (bucket, count) in Bucket::ALL.iter().zip(counts) {
            *buckets.slot(*bucket) = *count;
        }
        buckets
    }

    pub fn get(&self, bucket: Bucket) -> i64 {
        match bucket {
            Bucket::Ok => self.ok,
            Bucket::Warning => self.warning,
            Bucket::Error => self.error,
            Bucket::Redirection => self.redirection,
            Bucket::Level1 => self.level1,
            Bucket::Level2 => self.level2,
            Bucket::Level3 => self.level3,
            Bucket::Level4 => self.level4,
            Bucket::SuccessPages => self.success_pages,
            Bucket::RedirectPages => self.redirect_pages,
            Bucket::ClientErrorPages => self.client_error_pages,
            Bucket::ServerErrorPages => self.server_error_pages,
        }
    }

    fn slot(&mut self, bucket: Bucket) -> &mut i64 {
        match bucket {
            Bucket::Ok => &mut self.ok,
            Bucket::Warning => &mut self.warning,
            Bucket::Error => &mut self.error,
            Bucket::Redirection => &mut self.redirection,
            Bucket::Level1 => &mut self.level1,
            Bucket::Level2 => &mut self.level2,
            Bucket::Level3 => &mut self.level3,
            Bucket::Level4 => &mut self.level4,
            Bucket::SuccessPages => &mut self.success_pages,
            Bucket::RedirectPages => &mut self.redirect_pages,
            Bucket::ClientErrorPages => &mut self.client_error_pages,
            Bucket::ServerErrorPages => &mut self.server_error_pages,
        }
    }

    /// Signed per-bucket difference `self - other`.
    pub fn delta(&self, other: &PageBuckets) -> PageBuckets {
        let mut delta = PageBuckets::from_counts(self.total - other.total, &[]);
        for bucket in Bucket::ALL {
            *delta.slot(bucket) = self.get(bucket) - other.get(bucket);
        }
        delta
    }
}
