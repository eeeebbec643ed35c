pub mod books;
pub mod users;

use std::sync::Arc;

use bookshelf_authz::TokenAuthority;
use bookshelf_kernel::ModuleRegistry;

use books::BookStore;

/// Register all project-specific modules with the registry
pub fn register_all(
    registry: &mut ModuleRegistry,
    books_store: Arc<dyn BookStore>,
    authority: Arc<TokenAuthority>,
) {
    registry.register_custom(books::create_module(books_store));
    registry.register_custom(users::create_module(authority));
}
