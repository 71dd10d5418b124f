/// Integration tests for named caches and the registry helpers
#[cfg(test)]
mod tests {
    use lrumemo::{lru_cache, registry};
    use serial_test::serial;

    #[lru_cache(maxsize = 4, name = "tenant_lookup")]
    fn find_tenant(id: u32) -> String {
        format!("tenant-{}", id)
    }

    #[lru_cache(maxsize = 4)]
    fn find_region(id: u32) -> String {
        format!("region-{}", id)
    }

    #[test]
    #[serial]
    fn test_custom_and_default_names_are_registered() {
        find_tenant(1);
        find_region(1);

        let registered = registry::list();
        assert!(registered.contains(&"tenant_lookup".to_string()));
        assert!(registered.contains(&"find_region".to_string()));
        assert!(!registered.contains(&"find_tenant".to_string()));
    }

    #[test]
    #[serial]
    fn test_reset_stats_keeps_entries() {
        lrumemo::cache_clear("tenant_lookup");
        find_tenant(10);
        find_tenant(10);
        find_tenant(11);

        let info = lrumemo::cache_info("tenant_lookup").unwrap();
        assert_eq!((info.hits, info.misses, info.current_size), (1, 2, 2));

        assert!(lrumemo::reset_stats("tenant_lookup"));
        let info = lrumemo::cache_info("tenant_lookup").unwrap();
        assert_eq!((info.hits, info.misses, info.current_size), (0, 0, 2));

        // Still cached after the reset
        find_tenant(10);
        assert_eq!(lrumemo::cache_info("tenant_lookup").unwrap().hits, 1);
    }

    #[test]
    #[serial]
    fn test_clear_empties_cache_and_zeroes_counters() {
        find_region(20);
        find_region(20);
        assert!(lrumemo::cache_info("find_region").unwrap().current_size >= 1);

        assert!(lrumemo::cache_clear("find_region"));
        let info = lrumemo::cache_info("find_region").unwrap();
        assert_eq!((info.hits, info.misses, info.current_size), (0, 0, 0));

        find_region(20);
        let info = lrumemo::cache_info("find_region").unwrap();
        assert_eq!((info.hits, info.misses, info.current_size), (0, 1, 1));
    }

    #[test]
    #[serial]
    fn test_unknown_cache_name() {
        assert!(lrumemo::cache_info("no_such_cache").is_none());
        assert!(!lrumemo::cache_clear("no_such_cache"));
        assert!(!lrumemo::reset_stats("no_such_cache"));
    }
}
