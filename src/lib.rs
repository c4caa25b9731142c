//! Cyclewise - cycle-phase tracking and symptom insights.
//!
//! # Overview
//!
//! Cyclewise keeps a small health profile and a symptom log per user. From
//! those it derives where the user is in their menstrual cycle, summarises
//! recent symptoms, and asks a text-generation service for phase-aware
//! wellness guidance.
//!
//! The two computational pieces are pure and take the clock as an argument:
//!
//! - [`phase::compute_cycle_status`] maps a cycle profile to the current phase,
//!   day of cycle, phase window, and countdowns.
//! - [`aggregation::analyze_symptoms`] ranks symptoms by frequency, averages
//!   severities, and partitions them by category.
//!
//! # Modules
//!
//! - [`model`]: Data types for profiles, symptoms, and computed status
//! - [`phase`]: Cycle phase engine and the canonical phase table
//! - [`aggregation`]: Symptom aggregation
//! - [`insights`]: Prompt assembly, the text-generation port, and response parsing
//! - [`gemini`]: Gemini implementation of the text-generation port
//! - [`storage`]: SQLite storage layer
//! - [`config`]: Environment-driven configuration
//! - [`api`]: HTTP API handlers

pub mod aggregation;
pub mod api;
pub mod config;
pub mod gemini;
pub mod insights;
pub mod model;
pub mod phase;
pub mod storage;
