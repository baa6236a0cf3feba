//! Параллельная загрузка нескольких секций страницы.
//!
//! Каждый именованный вызов запускается отдельной задачей tokio, `join` ждёт их все
//! (никакого частичного рендера). Мягкий сбой одного вызова остаётся в своём слоте как
//! [`Upstream::Unavailable`]. Жёсткий сбой (задача упала с паникой или была отменена)
//! возвращается как [`AggregateError`].

use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error};

use super::upstream::Upstream;

#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error("fetch task `{name}` failed: {source}")]
    Task {
        name: &'static str,
        #[source]
        source: JoinError,
    },
}

#[derive(Default)]
pub struct ParallelFetch {
    calls: Vec<(&'static str, JoinHandle<Upstream<Value>>)>,
}

impl ParallelFetch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Запускает вызов сразу же, не дожидаясь `join`.
    pub fn spawn<F>(mut self, name: &'static str, call: F) -> Self
    where
        F: Future<Output = Upstream<Value>> + Send + 'static,
    {
        self.calls.push((name, tokio::spawn(call)));
        self
    }

    pub async fn join(self) -> Result<FetchResults, AggregateError> {
        let (names, handles): (Vec<_>, Vec<_>) = self.calls.into_iter().unzip();
        let outcomes = join_all(handles).await;

        let mut slots = HashMap::with_capacity(names.len());
        let mut failure = None;
        for (name, outcome) in names.into_iter().zip(outcomes) {
            match outcome {
                Ok(result) => {
                    if !result.is_available() {
                        debug!("Section `{}` left empty", name);
                    }
                    slots.insert(name, result);
                }
                Err(source) => {
                    error!("Parallel fetch `{}` crashed: {}", name, source);
                    failure.get_or_insert(AggregateError::Task { name, source });
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(FetchResults { slots }),
        }
    }
}

#[derive(Debug)]
pub struct FetchResults {
    slots: HashMap<&'static str, Upstream<Value>>,
}

impl FetchResults {
    pub fn take(&mut self, name: &str) -> Upstream<Value> {
        self.slots.remove(name).unwrap_or(Upstream::Unavailable)
    }
}
