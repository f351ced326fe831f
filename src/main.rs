use std::sync::Arc;

use dotenvy::dotenv;
use snafu::ResultExt as _;

use cloudversity::api::{create_app, create_router};
use cloudversity::config::Config;
use cloudversity::database::Database;
use cloudversity::error::{
    ApplicationError, BindAddressSnafu, ConnectDatabaseSnafu, MediaClientSnafu, PaymentClientSnafu, WebServerSnafu,
};
use cloudversity::logger;
use cloudversity::media::Cloudinary;
use cloudversity::payment::Stripe;

#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    dotenv().ok();

    let config = Config::from_env()?;

    let _guard = logger::init(&config)?;

    let database = Database::connect(&config.surreal).await.context(ConnectDatabaseSnafu)?;
    let media = Cloudinary::new(config.media.clone(), config.external_timeout()).context(MediaClientSnafu)?;
    let gateway = Stripe::new(config.payment.clone(), config.external_timeout()).context(PaymentClientSnafu)?;

    let app = create_app(&config, database, Arc::new(media), Arc::new(gateway));
    let router = create_router(app, config.request_timeout());

    let listener = tokio::net::TcpListener::bind(config.host)
        .await
        .context(BindAddressSnafu { address: config.host })?;
    tracing::info!(address = %config.host, "listening");

    axum::serve(listener, router).await.context(WebServerSnafu)
}
