// Kernel - storage traits, their PostgreSQL and in-memory implementations,
// and the dependency container handed to every action.

pub mod deps;
pub mod postgres_store;
pub mod test_dependencies;
pub mod traits;

pub use deps::CoreDeps;
pub use postgres_store::PostgresStore;
pub use test_dependencies::{
    InMemoryAuditCheckStore, InMemoryPageStore, InMemorySessionStore, InMemoryViewStore,
    PageFixture, TestDependencies,
};
pub use traits::*;
