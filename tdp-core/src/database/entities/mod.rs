// Taxonomy
pub mod categories;
pub mod service_categories;
pub mod tags;
pub mod tour_categories;

// Content
pub mod blog_posts;
pub mod news_posts;
pub mod price_pdfs;
pub mod reviews;
pub mod services;
pub mod site_settings;
pub mod tours;

// Many-to-many link tables
pub mod service_category_links;
pub mod service_tags;
pub mod tour_category_links;
pub mod tour_tags;

// Restore bookkeeping
pub mod restore_status;
pub mod restore_tasks;

pub use restore_status::RestoreStatus;
