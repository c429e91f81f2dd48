use actix_cors::Cors;
use actix_web::{web, App, HttpServer};

#[path = "utils/database.rs"] mod db;
#[path = "utils/encrypt.rs"] mod enc;
#[path = "utils/enums.rs"] mod enums;
#[path = "utils/structures.rs"] mod structures;

#[path = "data/companies.rs"] mod companies;
#[path = "data/superadmins.rs"] mod superadmins;
#[path = "data/users.rs"] mod users;
#[path = "data/sessions.rs"] mod sessions;
#[path = "data/jobs.rs"] mod jobs;
#[path = "data/applications.rs"] mod applications;
#[path = "data/logs.rs"] mod activity;

#[path = "utils/routes/auth.rs"] mod auth_routes;
#[path = "utils/routes/companies.rs"] mod company_routes;
#[path = "utils/routes/users.rs"] mod user_routes;
#[path = "utils/routes/jobs.rs"] mod job_routes;
#[path = "utils/routes/applications.rs"] mod application_routes;
#[path = "utils/routes/logs.rs"] mod log_routes;
#[path = "utils/routes/public.rs"] mod public_routes;
#[path = "utils/routes/misc.rs"] mod misc;

// First boot of a fresh database: without at least one console operator
// nobody can administer tenants, so one is created from the environment.
fn seed_root_superadmin(state: &structures::AppState, database: &db::Database) {
    let existing = match superadmins::Superadmin::count(database) {
        Ok(count) => count,
        Err(e) => {
            tracing::error!("failed to count superadmins: {}", e);
            return;
        }
    };
    if existing > 0 {
        return;
    }

    let email = std::env::var("MAKARID_ROOT_EMAIL").ok();
    let password = std::env::var("MAKARID_ROOT_PASSWORD").ok();
    match (email, password) {
        (Some(email), Some(password)) => {
            let hash = match enc::hash_password(&password, &state.hash_secret) {
                Ok(hash) => hash,
                Err(e) => {
                    tracing::error!("failed to hash root password: {}", e);
                    return;
                }
            };
            match superadmins::Superadmin::insert(database, &email, &hash, "Root") {
                Ok(admin) => tracing::info!("seeded root superadmin {}", admin.email),
                Err(e) => tracing::error!("failed to seed root superadmin: {}", e),
            }
        }
        _ => {
            tracing::warn!("no superadmin exists and MAKARID_ROOT_EMAIL/MAKARID_ROOT_PASSWORD are unset, the console is unreachable");
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let state = structures::AppState::from_env();

    let database = match db::Database::open(&state.db_path) {
        Ok(database) => database,
        Err(e) => {
            tracing::error!("cannot open database at {}: {}", state.db_path.display(), e);
            return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
        }
    };
    if let Err(e) = database.init() {
        tracing::error!("schema initialization failed: {}", e);
        return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
    }
    seed_root_superadmin(&state, &database);
    drop(database);

    let bind = std::env::var("MAKARID_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    tracing::info!("starting makarid backend on {}", bind);

    let app_state = web::Data::new(state);
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(Cors::permissive())
            // auth and session resolution
            .service(auth_routes::console_login)
            .service(auth_routes::unified_login)
            .service(auth_routes::select_company)
            .service(auth_routes::google_callback)
            .service(auth_routes::twofa_validate)
            .service(auth_routes::twofa_setup)
            .service(auth_routes::twofa_enable)
            .service(auth_routes::me)
            .service(auth_routes::logout)
            // super-admin console
            .service(company_routes::list_companies)
            .service(company_routes::create_company)
            .service(company_routes::update_company)
            .service(company_routes::set_company_active)
            .service(company_routes::delete_company)
            .service(user_routes::list_superadmins)
            .service(user_routes::create_superadmin)
            .service(user_routes::delete_superadmin)
            // tenant administration
            .service(user_routes::list_users)
            .service(user_routes::create_user)
            .service(user_routes::update_user)
            .service(user_routes::set_user_active)
            .service(user_routes::delete_user)
            .service(job_routes::list_jobs)
            .service(job_routes::get_job)
            .service(job_routes::create_job)
            .service(job_routes::update_job)
            .service(job_routes::publish_job)
            .service(job_routes::close_job)
            .service(job_routes::delete_job)
            .service(application_routes::list_applications)
            .service(application_routes::get_application)
            .service(application_routes::update_application_status)
            .service(application_routes::trash_application)
            .service(application_routes::restore_application)
            .service(application_routes::delete_application)
            .service(log_routes::list_logs)
            .service(log_routes::dashboard_stats)
            // public careers surface
            .service(public_routes::resolve_tenant)
            .service(public_routes::company_profile)
            .service(public_routes::company_jobs)
            .service(public_routes::public_job)
            .service(public_routes::apply)
            // uploads and plumbing
            .service(misc::upload)
            .service(misc::serve_file)
            .service(misc::health_check)
    })
    .bind(bind)?
    .run()
    .await
}
