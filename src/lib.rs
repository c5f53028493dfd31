//! Type-directed dependency injection, encrypted cookie sessions and CSRF
//! protection for axum applications.

pub mod app;
pub mod config;
pub mod error;
pub mod injector;
pub mod state;

pub mod crypto {
    pub mod cookie;
    pub mod csrf;
    pub mod cypher;
    pub mod hash;
    pub mod token;
}

pub mod models {
    pub mod session;
    pub mod user;
}

pub mod repositories {
    pub mod redis_session;
    pub mod session;
}

pub mod services {
    pub mod session;
    pub mod users;
}

pub mod handlers {
    pub mod auth;
}

pub mod middleware_layer {
    pub mod auth;
    pub mod csrf;
}

pub mod web {
    pub mod context;
    pub mod muxi;
}
