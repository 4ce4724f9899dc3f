pub mod dat_reader;
pub mod feature;
pub mod features_collector;
pub mod storage_info;
