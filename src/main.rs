use std::sync::Arc;

use axum::{Router, routing::get};
use cutout_backend::features::cutout::{
    create_cutout_router,
    remover::{BackgroundRemover, ImglyRemover},
};
use cutout_backend::features::health::handler::health_check;
use cutout_backend::startup::run_startup_checks;
use cutout_backend::state::AppState;
use cutout_backend::{AppError, ShutdownManager, config::AppConfig};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        cutout_backend::features::cutout::handler::remove_background,
        cutout_backend::features::health::handler::health_check,
    ),
    components(
        schemas(
            AppError,
            cutout_backend::error::ProblemDetails,
            cutout_backend::features::cutout::handler::RemoveBgForm,
            cutout_backend::features::health::handler::HealthResponse,
        )
    ),
    tags(
        (name = "Cutout", description = "Background removal APIs"),
        (name = "Health", description = "Health APIs"),
    ),
    info(
        title = "Cutout Backend API",
        version = "0.1.0",
        description = "Image background removal service (Axum)"
    )
)]
pub struct ApiDoc;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cutout_backend=info,tower_http=info".into()),
        )
        .init();

    // 创建优雅退出管理器
    let shutdown_manager = ShutdownManager::new();

    // Load config
    if let Err(e) = AppConfig::init_global() {
        tracing::error!("Config init failed: {}", e);
        std::process::exit(1);
    }
    let config = AppConfig::global();

    // 启动信号处理器
    if let Err(e) = shutdown_manager.start_signal_handler().await {
        tracing::error!("信号处理器启动失败: {}", e);
        std::process::exit(1);
    }

    // Run startup checks（模型缓存校验 / 下载）
    if let Err(e) = run_startup_checks(config).await {
        tracing::error!("Startup checks failed: {}", e);
        std::process::exit(1);
    }

    // 推理会话（跨请求复用）
    let remover: Arc<dyn BackgroundRemover> = match ImglyRemover::new(&config.inference) {
        Ok(r) => Arc::new(r),
        Err(e) => {
            tracing::error!("推理会话初始化失败: {}", e);
            std::process::exit(1);
        }
    };

    // Shared state
    let app_state = AppState::from_config(config, remover);

    // Routes
    let api_router = create_cutout_router();
    let app = Router::<AppState>::new().route("/health", get(health_check));
    // 路由前缀为空时直接合并到根路径（axum 的 nest 不接受空前缀）。
    let app = if config.api.prefix.is_empty() || config.api.prefix == "/" {
        app.merge(api_router)
    } else {
        app.nest(&config.api.prefix, api_router)
    };
    let mut app = app
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state)
        .layer(axum::middleware::from_fn(
            cutout_backend::request_id::request_id_middleware,
        ));

    if let Some(cors) = cutout_backend::cors::build_cors_layer(&config.cors) {
        app = app.layer(cors);
    }

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Bind address failed {}: {}", addr, e);
            std::process::exit(1);
        });

    tracing::info!("Server: http://{}", addr);
    tracing::info!("Docs: http://{}/docs", addr);
    tracing::info!("Health: http://{}/health", addr);
    tracing::info!("Remove-BG API: http://{}{}/remove-bg/", addr, config.api.prefix);

    // 超时看护：优雅退出超过时限后按配置强制退出
    let shutdown_config = config.shutdown.clone();
    let manager_for_deadline = shutdown_manager.clone();
    tokio::spawn(async move {
        manager_for_deadline.wait_for_shutdown().await;
        tokio::time::sleep(shutdown_config.timeout_duration()).await;
        if shutdown_config.force_quit {
            tracing::warn!("优雅退出超时（{}秒），强制退出", shutdown_config.timeout_secs);
            std::process::exit(1);
        }
    });

    // 运行服务器直到收到退出信号
    let graceful = axum::serve(listener, app).with_graceful_shutdown(async move {
        let reason = shutdown_manager.wait_for_shutdown().await;
        tracing::info!("接收到退出信号: {:?}，开始优雅退出...", reason);
    });

    if let Err(e) = graceful.await {
        tracing::error!("服务器运行错误: {}", e);
        std::process::exit(1);
    }

    tracing::info!("服务器已优雅关闭");
}
