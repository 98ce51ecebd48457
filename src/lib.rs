//! reqvector - requirement-vector annotation for teaching-resource spreadsheets.
//!
//! Scores each row of a resource table against a fixed set of 22 science
//! and technology domains using an LLM chat API, checkpointing progress to
//! the output workbook so interrupted runs can resume. Also ships the
//! knowledge-point splitter used to prepare label sheets.

pub mod config;
pub mod llm;
pub mod models;
pub mod services;
pub mod storage;
