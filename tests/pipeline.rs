//! End-to-end parse -> validate -> compile tests, no database required

use std::sync::Arc;

use runtara_filter::parser::{parse_filters, parse_sorts};
use runtara_filter::{
    Describe, EntityDescriptor, FieldDescriptor, FieldType, FilterConfig, FilterError,
    FilterService, JoinAggregator, JoinedView, Junction, ParamValue, SchemaCatalog,
};

struct User;

impl Describe for User {
    const ENTITY: &'static str = "User";

    fn descriptor() -> runtara_filter::Result<EntityDescriptor> {
        EntityDescriptor::builder("User")
            .id_column("u.user_id")
            .field(FieldDescriptor::new("userId", FieldType::Integer).column("u.user_id"))
            .field(FieldDescriptor::new("username", FieldType::String).column("u.username"))
            .field(FieldDescriptor::new("firstName", FieldType::String).column("u.first_name"))
            .field(FieldDescriptor::new("lastName", FieldType::String).column("u.last_name"))
            .field(FieldDescriptor::junction(
                "roleIds",
                FieldType::Integer,
                Junction::new("user_roles", "user_id", "role_id"),
            ))
            .build()
    }
}

struct DealFilterView;

impl Describe for DealFilterView {
    const ENTITY: &'static str = "DealFilterView";

    fn descriptor() -> runtara_filter::Result<EntityDescriptor> {
        EntityDescriptor::builder("DealFilterView")
            .id_column("d.deal_id")
            .field(FieldDescriptor::new("dealId", FieldType::Integer).column("d.deal_id"))
            .field(FieldDescriptor::new("dealName", FieldType::String).column("d.deal_name"))
            .field(FieldDescriptor::new("dealStatus", FieldType::String).column("d.deal_status"))
            .field(FieldDescriptor::new("dealAmount", FieldType::Decimal).column("d.deal_amount"))
            .field(FieldDescriptor::new("closeDate", FieldType::Date).column("d.close_date"))
            .field(FieldDescriptor::new("ownerName", FieldType::String).column("u.username"))
            .field(FieldDescriptor::new("programName", FieldType::String).column("p.program_name"))
            .field(
                FieldDescriptor::new("contractNumber", FieldType::String)
                    .column("c.contract_number"),
            )
            .build()
    }
}

const USERS_SELECT: &str = "SELECT u.* FROM users u";

fn service() -> FilterService {
    let catalog = Arc::new(SchemaCatalog::new());
    catalog.describe_entity::<User>().unwrap();
    catalog.describe_entity::<DealFilterView>().unwrap();
    FilterService::new(catalog, FilterConfig::default())
}

fn compile_users(filter: &str, sort: &str) -> runtara_filter::CompiledQuery {
    let service = service();
    let request = service
        .parse_and_validate("User", service.request(None, None, Some(filter), Some(sort)))
        .unwrap();
    service.compile("User", USERS_SELECT, &request).unwrap()
}

// =============================================================================
// Compilation
// =============================================================================

#[test]
fn test_two_filters_and_sort() {
    let query = compile_users("firstName:eq:Doe,lastName:eq:Smith", "lastName:desc,userId");

    assert_eq!(
        query.sql,
        "SELECT u.* FROM users u WHERE u.first_name = :p1 AND u.last_name = :p2 ORDER BY u.last_name DESC, u.user_id ASC LIMIT :limit OFFSET :offset"
    );
    assert_eq!(
        query.count_sql,
        "SELECT COUNT(*) FROM users u WHERE u.first_name = :p1 AND u.last_name = :p2"
    );
    assert_eq!(query.params.get("p1"), Some(&ParamValue::Text("Doe".into())));
    assert_eq!(query.params.get("p2"), Some(&ParamValue::Text("Smith".into())));
}

#[test]
fn test_junction_list_renders_positionally() {
    let query = compile_users("roleIds:in:(1,3),username:contains:ad", "");

    let (sql, values) = query.statement().to_positional().unwrap();
    assert_eq!(
        sql,
        r#"SELECT u.* FROM users u WHERE u.user_id IN (SELECT "user_roles"."user_id" FROM "user_roles" WHERE "user_roles"."role_id" IN ($1, $2)) AND u.username LIKE $3 LIMIT $4 OFFSET $5"#
    );
    assert_eq!(
        values,
        vec![
            ParamValue::Integer(1),
            ParamValue::Integer(3),
            ParamValue::Text("%ad%".into()),
            ParamValue::Integer(20),
            ParamValue::Integer(0),
        ]
    );

    let (count_sql, count_values) = query.count_statement().to_positional().unwrap();
    assert!(count_sql.starts_with("SELECT COUNT(*) FROM users u WHERE u.user_id IN"));
    assert_eq!(count_values.len(), 3);
}

#[test]
fn test_malicious_value_never_reaches_sql() {
    let payload = "x'; DROP TABLE users; --";
    let query = compile_users(&format!("username:eq:{payload}"), "");

    assert!(!query.sql.contains("DROP TABLE"));
    assert!(!query.count_sql.contains("DROP TABLE"));
    assert_eq!(query.params.get("p1"), Some(&ParamValue::Text(payload.into())));
}

#[test]
fn test_round_trip_of_applied_criteria() {
    let text = "lastName:sw:Sm,roleIds:nin:(2,4),firstName:notnull";
    let filters = parse_filters(text).unwrap();
    let rendered: Vec<String> = filters.iter().map(ToString::to_string).collect();
    assert_eq!(parse_filters(&rendered.join(",")).unwrap(), filters);

    let sorts = parse_sorts("lastName,userId:DESC").unwrap();
    let rendered: Vec<String> = sorts.iter().map(ToString::to_string).collect();
    assert_eq!(rendered, vec!["lastName:asc", "userId:desc"]);
}

// =============================================================================
// Error Reporting
// =============================================================================

#[test]
fn test_bad_operator_and_unknown_field_reported_together() {
    let service = service();
    let err = service
        .parse_and_validate(
            "User",
            service.request(None, None, Some("lastName:invalidOp:x,unknownField:eq:y"), None),
        )
        .unwrap_err();

    assert!(err.is_client_error());
    let errors = err.errors();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().any(|e| e.contains("invalidOp")));
    assert!(errors.iter().any(|e| e.contains("unknownField")));
    assert!(err.to_string().starts_with("Filter validation failed: "));
}

#[test]
fn test_type_violations_batched() {
    let service = service();
    let err = service
        .parse_and_validate(
            "DealFilterView",
            service.request(
                None,
                None,
                Some("dealAmount:gt:lots,closeDate:lt:someday,dealName:gte:A"),
                Some("missing:desc"),
            ),
        )
        .unwrap_err();

    assert!(matches!(err, FilterError::Validation { .. }));
    assert_eq!(err.errors().len(), 4);
}

// =============================================================================
// Join Aggregation Plan
// =============================================================================

#[test]
fn test_deal_view_plan() {
    let service = service();
    let request = service
        .parse_and_validate(
            "DealFilterView",
            service.request(
                Some(5),
                Some(10),
                Some("dealStatus:in:(OPEN,PENDING),closeDate:gte:2024-01-01"),
                Some("dealAmount:desc"),
            ),
        )
        .unwrap();

    let aggregator = JoinAggregator::new(JoinedView::new(
        "d.*, u.username, p.program_id, p.program_name, c.contract_id, c.contract_number",
        "deals d LEFT JOIN users u ON u.user_id = d.owner_id \
         LEFT JOIN programs p ON p.deal_id = d.deal_id \
         LEFT JOIN contracts c ON c.program_id = p.program_id",
        "d.deal_id",
    ));
    let descriptor = service.catalog().describe("DealFilterView").unwrap();
    let plan = aggregator.plan(&descriptor, &request).unwrap();

    assert!(
        plan.count
            .sql
            .starts_with("SELECT COUNT(DISTINCT d.deal_id) FROM deals d LEFT JOIN")
    );
    assert!(
        plan.count
            .sql
            .ends_with("WHERE d.deal_status IN (:p1) AND d.close_date >= :p2")
    );
    assert!(plan.root_ids.sql.ends_with(
        "GROUP BY d.deal_id, d.deal_amount ORDER BY d.deal_amount DESC, d.deal_id ASC LIMIT :limit OFFSET :offset"
    ));

    let (_, values) = plan.root_ids.to_positional().unwrap();
    assert_eq!(values.len(), 5);
    assert_eq!(values[3], ParamValue::Integer(5));
    assert_eq!(values[4], ParamValue::Integer(10));

    let rows = plan.rows(vec![7i64, 3]);
    let (sql, values) = rows.to_positional().unwrap();
    assert!(
        sql.ends_with("WHERE d.deal_id IN ($1, $2) ORDER BY d.deal_amount DESC, d.deal_id ASC")
    );
    assert_eq!(values, vec![ParamValue::Integer(7), ParamValue::Integer(3)]);
}
