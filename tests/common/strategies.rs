use proptest::prelude::*;

/// Resource keys the pre-processor recognises for list endpoints
pub fn list_resource_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "groups",
        "organizations",
        "users",
        "tickets",
        "ticket_fields",
        "organization_fields",
        "user_fields",
        "audits",
        "ticket_metrics",
        "satisfaction_ratings",
    ])
}

/// Page sizes on both sides of the default ceiling
pub fn page_count_strategy() -> impl Strategy<Value = i64> {
    prop_oneof![0i64..1000, 1000i64..1500]
}

/// Unix timestamps between the epoch and 2100
pub fn unix_seconds_strategy() -> impl Strategy<Value = i64> {
    0i64..4_102_444_800
}

/// Column layouts: at least one column, each flagged key or value
pub fn column_layout_strategy() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 1..12)
}
