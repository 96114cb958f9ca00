pub mod db_utils;
pub mod leave_type_cache;
