pub mod db_utils;
pub mod init_admin;
