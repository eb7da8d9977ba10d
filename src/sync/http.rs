// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The HTTP implementation of the remote store contract. Transport timeouts
//! and retries live in the reconciler; a failed request simply surfaces as a
//! push failure.

use percent_encoding::AsciiSet;
use percent_encoding::CONTROLS;
use percent_encoding::utf8_percent_encode;
use reqwest::Client;
use reqwest::StatusCode;

use crate::error::Fallible;
use crate::sync::remote::ProgressRow;
use crate::sync::remote::RemoteStore;
use crate::sync::remote::ResumeRow;
use crate::sync::remote::UsageRow;
use crate::types::counters::SummaryCounters;
use crate::types::item_key::ItemKey;
use crate::types::selection::DailySelection;

/// Characters escaped in path segments. Item keys may contain spaces and
/// arbitrary punctuation.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`');

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

pub struct HttpRemote {
    base_url: String,
    client: Client,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            base_url,
            client: Client::new(),
        }
    }

    fn url(&self, user_key: &str, tail: &str) -> String {
        format!(
            "{}/users/{}/{tail}",
            self.base_url,
            encode_segment(user_key)
        )
    }
}

impl RemoteStore for HttpRemote {
    async fn upsert_progress(&self, user_key: &str, rows: &[ProgressRow]) -> Fallible<()> {
        let url = self.url(user_key, "progress");
        self.client
            .post(url)
            .json(rows)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn fetch_progress(&self, user_key: &str) -> Fallible<Vec<ProgressRow>> {
        let url = self.url(user_key, "progress");
        let rows = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<ProgressRow>>()
            .await?;
        Ok(rows)
    }

    async fn fetch_learned_keys(&self, user_key: &str) -> Fallible<Vec<ItemKey>> {
        let url = self.url(user_key, "learned");
        let raw = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<String>>()
            .await?;
        let mut keys = Vec::with_capacity(raw.len());
        for value in raw {
            match ItemKey::parse(&value) {
                Ok(key) => keys.push(key),
                Err(e) => {
                    log::warn!("Skipping malformed learned key {value:?}: {e}");
                }
            }
        }
        Ok(keys)
    }

    async fn upsert_usage_time(&self, user_key: &str, rows: &[UsageRow]) -> Fallible<()> {
        let url = self.url(user_key, "usage");
        self.client
            .post(url)
            .json(rows)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn fetch_usage_times(&self, user_key: &str) -> Fallible<Vec<UsageRow>> {
        let url = self.url(user_key, "usage");
        let rows = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<UsageRow>>()
            .await?;
        Ok(rows)
    }

    async fn upsert_daily_selection(
        &self,
        user_key: &str,
        selection: &DailySelection,
    ) -> Fallible<()> {
        let tail = format!("selection/{}", selection.date);
        let url = self.url(user_key, &tail);
        self.client
            .put(url)
            .json(selection)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn upsert_resume(&self, user_key: &str, rows: &[ResumeRow]) -> Fallible<()> {
        let url = self.url(user_key, "resume");
        self.client
            .post(url)
            .json(rows)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn fetch_summary(&self, user_key: &str) -> Fallible<Option<SummaryCounters>> {
        let url = self.url(user_key, "summary");
        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let counters = response
            .error_for_status()?
            .json::<SummaryCounters>()
            .await?;
        Ok(Some(counters))
    }

    async fn mark_learned(
        &self,
        user_key: &str,
        row: &ProgressRow,
    ) -> Fallible<Option<SummaryCounters>> {
        let tail = format!("learned/{}", encode_segment(&row.item_key.to_string()));
        let url = self.url(user_key, &tail);
        let response = self
            .client
            .post(url)
            .json(row)
            .send()
            .await?
            .error_for_status()?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let counters = response.json::<SummaryCounters>().await?;
        Ok(Some(counters))
    }
}
