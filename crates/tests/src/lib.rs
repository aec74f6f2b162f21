//! Cross-crate integration tests for the madrigal workspace

#[cfg(test)]
mod pipeline_integration;
