pub mod cli;
pub mod env_boot;
pub mod guard;
pub mod logging;
pub mod schema;

pub mod util {
    pub mod db;
    pub mod env;
}

pub use guard::{last_insert_id, InsertReport};
pub use util::db::{ConnectSettings, Db, Target};
