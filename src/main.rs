#[macro_use]
extern crate rocket;
#[macro_use]
extern crate log;

mod config;
mod db;
mod guards;
mod models;
mod routes;
mod services;
mod utils;

use dotenvy::dotenv;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::{Build, Request, Response, Rocket};
use rocket_okapi::swagger_ui::{SwaggerUIConfig, make_swagger_ui};

/* ----------------------------- CORS ----------------------------- */

pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        if let Some(origin) = request.headers().get_one("Origin") {
            response.set_header(Header::new("Access-Control-Allow-Origin", origin));
        }

        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        ));

        response.set_header(Header::new(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization, Stripe-Signature",
        ));

        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

/* ----------------------------- OPTIONS ----------------------------- */

#[options("/<_..>")]
fn options_handler() {}

/* ----------------------------- ERRORS ----------------------------- */

#[catch(404)]
fn not_found() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Resource not found (check /api/v1 prefix)"
    })
}

#[catch(500)]
fn internal_error() -> rocket::serde::json::Value {
    rocket::serde::json::json!({
        "success": false,
        "message": "Internal server error"
    })
}

/* ----------------------------- SWAGGER ----------------------------- */

fn swagger_config() -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: "/openapi.json".to_string(),
        ..Default::default()
    }
}

/* ----------------------------- LAUNCH ----------------------------- */

#[launch]
fn rocket() -> Rocket<Build> {
    dotenv().ok();
    env_logger::init();

    println!("🚀 ApplyHub API running");
    println!("📚 Swagger UI → http://localhost:8000/api/docs");

    rocket::build()
        .attach(db::init())
        .attach(CORS)
        .mount("/", routes![options_handler])
        .mount(
            "/api/v1",
            routes![
                // Auth
                routes::auth::register,
                routes::auth::login,
                routes::auth::refresh_token,
                // User
                routes::user::get_profile,
                routes::user::update_profile,
                // Plans & credits
                routes::plan::get_all_plans,
                routes::plan::get_my_plans,
                routes::plan::credits_summary,
                // Applications
                routes::application::create_application,
                routes::application::list_applications,
                routes::application::update_application_status,
                routes::application::export_applications,
                routes::application::get_analytics,
                // Batches
                routes::batch::get_my_batches,
                routes::batch::get_my_batch,
                // Billing
                routes::billing::validate_promo,
                routes::billing::create_checkout,
                routes::billing::stripe_webhook,
                routes::billing::get_transactions,
                // Notifications
                routes::notification::get_notifications,
                routes::notification::mark_read,
                routes::notification::mark_all_read,
                // ATS
                routes::ats::score_cv,
                // AI
                routes::ai::generate_cover_letter,
                routes::ai::generate_cv_summary,
                // Admin - Users
                routes::admin::get_all_users,
                routes::admin::upload_applications_csv,
                // Admin - Batches
                routes::admin::get_all_batches,
                routes::admin::update_batch_status,
                routes::admin::recompute_batch,
                // Admin - Plan catalog
                routes::admin::create_plan,
                routes::admin::update_plan,
                routes::admin::delete_plan,
                // Admin - Promo codes
                routes::admin::create_promo_code,
                routes::admin::get_all_promo_codes,
                routes::admin::deactivate_promo_code,
            ],
        )
        .mount("/api/docs", make_swagger_ui(&swagger_config()))
        .register("/", catchers![not_found, internal_error])
}
