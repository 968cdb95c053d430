pub mod in_memory;
pub mod models;
pub mod postgres;

pub use in_memory::InMemoryRepository;
pub use postgres::PostgresRepository;
