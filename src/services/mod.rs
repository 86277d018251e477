pub mod capital_flow;
pub mod concept_rank;
pub mod data_source;
pub mod eastmoney;
pub mod filter_pipeline;
pub mod indicators;
pub mod pipeline;
pub mod scoring;
pub mod sector_catalog;
pub mod sector_heat;
