#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    use crate::config::LimiterScope;
    use crate::rate::Limiters;

    #[tokio::test]
    async fn test_global_scope_shares_one_gate() {
        let l = Limiters::new(CancellationToken::new(), LimiterScope::Global, Duration::from_secs(3));
        let a = l.for_server("a");
        let b = l.for_server("b");
        assert!(Arc::ptr_eq(&a, &b));

        let _permit = a.try_acquire().unwrap();
        assert!(b.try_acquire().is_none());
    }

    #[tokio::test]
    async fn test_server_scope_isolates_servers() {
        let l = Limiters::new(CancellationToken::new(), LimiterScope::Server, Duration::from_secs(3));
        let a = l.for_server("a");
        assert!(Arc::ptr_eq(&a, &l.for_server("a")));

        let _pa = a.try_acquire().unwrap();
        let _pb = l.for_server("b").try_acquire().expect("other server must not be throttled");
        assert_eq!(l.for_server("b").name(), "b");
    }
}
