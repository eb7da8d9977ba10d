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

pub mod http;
#[cfg(test)]
pub mod mock;
pub mod reconciler;
pub mod remote;


#[cfg(test)]
mod http_tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::time::Duration;

    use axum::Json;
    use axum::Router;
    use axum::extract::Path;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::routing::post;
    use tokio::net::TcpListener;
    use tokio::net::TcpStream;
    use tokio::spawn;
    use tokio::time::sleep;

    use crate::error::Fallible;
    use crate::sync::http::HttpRemote;
    use crate::sync::remote::ProgressRow;
    use crate::sync::remote::RemoteStore;
    use crate::types::category::Category;
    use crate::types::counters::SummaryCounters;
    use crate::types::date::Date;
    use crate::types::item_key::ItemKey;
    use crate::types::progress::ProgressRecord;

    #[derive(Default)]
    struct ServerData {
        progress: BTreeMap<(String, String), ProgressRow>,
        summary: Option<SummaryCounters>,
    }

    type ServerState = Arc<Mutex<ServerData>>;

    async fn post_progress(
        State(state): State<ServerState>,
        Path(user_key): Path<String>,
        Json(rows): Json<Vec<ProgressRow>>,
    ) -> StatusCode {
        let mut data = state.lock().unwrap();
        for row in rows {
            data.progress
                .insert((user_key.clone(), row.item_key.to_string()), row);
        }
        StatusCode::OK
    }

    async fn get_progress(
        State(state): State<ServerState>,
        Path(user_key): Path<String>,
    ) -> Json<Vec<ProgressRow>> {
        let data = state.lock().unwrap();
        let rows = data
            .progress
            .iter()
            .filter(|((key, _), _)| *key == user_key)
            .map(|(_, row)| row.clone())
            .collect();
        Json(rows)
    }

    async fn get_learned(
        State(state): State<ServerState>,
        Path(user_key): Path<String>,
    ) -> Json<Vec<String>> {
        let data = state.lock().unwrap();
        let keys = data
            .progress
            .iter()
            .filter(|((key, _), row)| *key == user_key && row.status.is_terminal())
            .map(|((_, item), _)| item.clone())
            .collect();
        Json(keys)
    }

    async fn post_learned(
        State(state): State<ServerState>,
        Path((user_key, item)): Path<(String, String)>,
        Json(row): Json<ProgressRow>,
    ) -> Json<SummaryCounters> {
        let mut data = state.lock().unwrap();
        data.progress.insert((user_key.clone(), item), row);
        let mut summary = SummaryCounters::empty();
        summary.learned_count = data
            .progress
            .iter()
            .filter(|((key, _), row)| *key == user_key && row.status.is_terminal())
            .count() as u32;
        data.summary = Some(summary.clone());
        Json(summary)
    }

    async fn get_summary(
        State(state): State<ServerState>,
        Path(_user_key): Path<String>,
    ) -> Result<Json<SummaryCounters>, StatusCode> {
        let data = state.lock().unwrap();
        match &data.summary {
            Some(summary) => Ok(Json(summary.clone())),
            None => Err(StatusCode::NOT_FOUND),
        }
    }

    async fn start_mock_server(state: ServerState) -> Fallible<String> {
        let port = portpicker::pick_unused_port().unwrap();
        let bind = format!("127.0.0.1:{port}");
        let app = Router::new()
            .route("/users/{key}/progress", post(post_progress).get(get_progress))
            .route("/users/{key}/learned", get(get_learned))
            .route("/users/{key}/learned/{item}", post(post_learned))
            .route("/users/{key}/summary", get(get_summary))
            .with_state(state);
        let listener = TcpListener::bind(&bind).await?;
        spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        loop {
            if let Ok(stream) = TcpStream::connect(&bind).await {
                drop(stream);
                break;
            }
            sleep(Duration::from_millis(1)).await;
        }
        Ok(format!("http://{bind}"))
    }

    #[tokio::test]
    async fn test_http_roundtrip() -> Fallible<()> {
        let state: ServerState = Arc::new(Mutex::new(ServerData::default()));
        let base_url = start_mock_server(state.clone()).await?;
        let remote = HttpRemote::new(base_url);

        let today = Date::from_ymd(2026, 3, 1);
        let key = ItemKey::new("take off", Category::new("phrasal-verbs"));
        let record = ProgressRecord::new(key.clone(), today);
        let row = ProgressRow::from_record(&record);

        // No summary row yet.
        assert!(remote.fetch_summary("learner").await?.is_none());

        // Upserting the same row twice leaves exactly one logical row.
        remote.upsert_progress("learner", &[row.clone()]).await?;
        remote.upsert_progress("learner", &[row.clone()]).await?;
        assert_eq!(state.lock().unwrap().progress.len(), 1);

        let fetched = remote.fetch_progress("learner").await?;
        assert_eq!(fetched, vec![row.clone()]);

        // Mark learned; the item key survives percent-encoding.
        let mut retired = record.clone();
        crate::scheduler::retire(&mut retired, today);
        let summary = remote
            .mark_learned("learner", &ProgressRow::from_record(&retired))
            .await?
            .unwrap();
        assert_eq!(summary.learned_count, 1);
        assert_eq!(remote.fetch_learned_keys("learner").await?, vec![key]);

        // The summary row is now served.
        let fetched = remote.fetch_summary("learner").await?.unwrap();
        assert_eq!(fetched.learned_count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_http_failure_is_an_error() -> Fallible<()> {
        // Nothing is listening here.
        let port = portpicker::pick_unused_port().unwrap();
        let remote = HttpRemote::new(format!("http://127.0.0.1:{port}"));
        let result = remote.fetch_summary("learner").await;
        assert!(result.is_err());
        Ok(())
    }
}
