//! batchwork-core
//!
//! Chunk-oriented batch step execution with retry, backoff and a concurrency
//! throttle.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（Task, Chunk, ProcessOutcome, Decision, JobExecution, ids）
//! - **ports**: 抽象化レイヤー（ItemSource, ItemProcessor, ItemSink, JobStore, Clock）
//! - **retry**: リトライポリシー（BackoffPolicy, RetryOn, RetryContext）
//! - **engine**: step executor（chunk 実行、throttle、停止）
//! - **impls**: 実装（CSV source, file sink, in-memory store など）
//! - **app**: StepBuilder, Job, JobLauncher
//! - **error**: エラー型

pub mod app;
pub mod domain;
pub mod engine;
pub mod error;
pub mod impls;
pub mod ports;
pub mod retry;
