pub mod store;
pub mod router;

pub use store::{ArticleStore, PgArticleStore};
pub use router::{route, RouteOutcome};
