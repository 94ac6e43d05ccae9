/// GET /
pub async fn welcome() -> &'static str {
    "Welcome to LifeGuard"
}
