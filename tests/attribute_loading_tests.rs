/// Lazy loading and mass assignment tests
///
/// Run with: cargo test --test attribute_loading_tests

use std::sync::Arc;

use rustmemorm::{
    Condition, DataType, DbError, InMemoryRepository, Mapper, MapperConfig, ModelBuilder,
    Property, Record, RepositoryCall, Resource, Result, Value, Visibility,
};

fn setup(config: MapperConfig) -> Result<(Mapper, Arc<InMemoryRepository>)> {
    let repository = Arc::new(InMemoryRepository::new("default"));
    let mut mapper = Mapper::new(config);
    mapper.add_repository(repository.clone());
    mapper
        .define(
            ModelBuilder::new("Article")
                .property(Property::serial("id"))
                .property(Property::new("title", DataType::Text))
                .property(Property::new("body", DataType::Text).lazy_in("content"))
                .property(Property::new("summary", DataType::Text).lazy_in("content"))
                .property(Property::new("notes", DataType::Text).lazy())
                .property(
                    Property::new("slug", DataType::Text).default_with(|resource, _| {
                        resource
                            .attribute_get_loaded("title")
                            .ok()
                            .flatten()
                            .and_then(|title| title.as_str().map(|t| t.to_lowercase().replace(' ', "-")))
                            .into()
                    }),
                ),
        )?;
    mapper
        .define(
            ModelBuilder::new("Person")
                .property(Property::serial("id"))
                .property(Property::new("first_name", DataType::Text))
                .property(Property::new("last_name", DataType::Text))
                .property(Property::new("age", DataType::Integer))
                .property(Property::new("active", DataType::Boolean))
                .property(Property::new("secret", DataType::Text).writer(Visibility::Private))
                .property(Property::new("token", DataType::Text).reader(Visibility::Private))
                .setter("full_name", |resource: &Resource, value: Value| {
                    let full = value.as_str().unwrap_or_default().to_string();
                    let (first, last) = full.split_once(' ').unwrap_or((full.as_str(), ""));
                    resource.attribute_set("first_name", first)?;
                    resource.attribute_set("last_name", last)
                }),
        )?;
    Ok((mapper, repository))
}

async fn stored_article(repository: &InMemoryRepository) {
    repository
        .insert_row(
            "articles",
            Record::from([
                ("id".to_string(), Value::Integer(1)),
                ("title".to_string(), Value::from("Rust")),
                ("body".to_string(), Value::from("Ownership")),
                ("summary".to_string(), Value::from("Borrowing")),
                ("notes".to_string(), Value::from("Lifetimes")),
                ("slug".to_string(), Value::from("rust")),
            ]),
        )
        .await;
}

async fn find_article(mapper: &Mapper) -> Result<Resource> {
    Ok(mapper
        .find("Article", &vec![Value::Integer(1)])
        .await?
        .expect("stored article"))
}

fn read_fields(calls: &[RepositoryCall]) -> Vec<Vec<String>> {
    calls
        .iter()
        .filter_map(|call| match call {
            RepositoryCall::Read { fields, .. } => Some(fields.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_find_skips_lazy_attributes() -> Result<()> {
    let (mapper, repository) = setup(MapperConfig::default())?;
    stored_article(&repository).await;

    let article = find_article(&mapper).await?;
    assert!(article.attribute_loaded("title")?);
    assert!(!article.attribute_loaded("body")?);
    assert_eq!(
        read_fields(&repository.calls()?),
        vec![vec!["id".to_string(), "title".to_string(), "slug".to_string()]]
    );
    Ok(())
}

#[tokio::test]
async fn test_lazy_context_loads_together() -> Result<()> {
    let (mapper, repository) = setup(MapperConfig::default())?;
    stored_article(&repository).await;
    let article = find_article(&mapper).await?;
    repository.clear_calls()?;

    assert_eq!(article.attribute_get("body").await?, Value::from("Ownership"));
    assert!(article.attribute_loaded("summary")?);
    assert!(!article.attribute_loaded("notes")?);
    assert_eq!(article.attribute_get("summary").await?, Value::from("Borrowing"));

    let calls = repository.calls()?;
    assert_eq!(
        read_fields(&calls),
        vec![vec!["body".to_string(), "summary".to_string()]]
    );
    assert!(matches!(
        &calls[0],
        RepositoryCall::Read { conditions, .. } if conditions == &vec![Condition::eq("id", 1i64)]
    ));
    Ok(())
}

#[tokio::test]
async fn test_lazy_attribute_without_context_loads_alone() -> Result<()> {
    let (mapper, repository) = setup(MapperConfig::default())?;
    stored_article(&repository).await;
    let article = find_article(&mapper).await?;
    repository.clear_calls()?;

    assert_eq!(article.attribute_get("notes").await?, Value::from("Lifetimes"));
    assert_eq!(
        read_fields(&repository.calls()?),
        vec![vec!["notes".to_string()]]
    );
    Ok(())
}

#[tokio::test]
async fn test_lazy_load_does_not_dirty() -> Result<()> {
    let (mapper, repository) = setup(MapperConfig::default())?;
    stored_article(&repository).await;
    let article = find_article(&mapper).await?;

    article.attribute_get("body").await?;
    assert!(!article.is_dirty()?);

    article.attribute_set("body", "Traits")?;
    let dirty = article.dirty_attributes()?;
    assert_eq!(dirty.len(), 1);
    assert_eq!(dirty.values().next(), Some(&Value::from("Traits")));
    Ok(())
}

#[tokio::test]
async fn test_attributes_reads_every_public_attribute() -> Result<()> {
    let (mapper, repository) = setup(MapperConfig::default())?;
    stored_article(&repository).await;
    let article = find_article(&mapper).await?;

    let attributes = article.attributes().await?;
    assert_eq!(attributes.len(), 6);
    assert_eq!(attributes.get("notes"), Some(&Value::from("Lifetimes")));
    Ok(())
}

#[tokio::test]
async fn test_default_provider_sees_assigned_values() -> Result<()> {
    let (mapper, repository) = setup(MapperConfig::default())?;
    let article = mapper.build("Article", [("title", "Hello World")])?;

    assert!(article.save().await?);
    assert_eq!(
        article.attribute_get_loaded("slug")?,
        Some(Value::from("hello-world"))
    );
    assert_eq!(
        repository.rows("articles").await[0].get("slug"),
        Some(&Value::from("hello-world"))
    );
    Ok(())
}

#[tokio::test]
async fn test_unknown_setter_is_a_naming_error() -> Result<()> {
    let (mapper, _) = setup(MapperConfig::default())?;
    let err = mapper.build("Person", [("nickname", "Bob")]).unwrap_err();
    assert!(matches!(
        err,
        DbError::Naming { model, setter } if model == "Person" && setter == "nickname"
    ));
    Ok(())
}

#[tokio::test]
async fn test_private_writer_has_no_setter() -> Result<()> {
    let (mapper, _) = setup(MapperConfig::default())?;
    let person = mapper.new_resource("Person")?;

    let err = person.assign_attributes([("first_name", "Ada"), ("secret", "x")]).unwrap_err();
    assert!(matches!(err, DbError::Naming { setter, .. } if setter == "secret"));
    assert!(!person.attribute_loaded("first_name")?);
    Ok(())
}

#[tokio::test]
async fn test_boolean_query_mark_is_stripped() -> Result<()> {
    let (mapper, _) = setup(MapperConfig::default())?;
    let person = mapper.build("Person", [("active?", true)])?;
    assert_eq!(person.attribute_get("active").await?, Value::Boolean(true));
    Ok(())
}

#[tokio::test]
async fn test_custom_setter_is_used() -> Result<()> {
    let (mapper, _) = setup(MapperConfig::default())?;
    let person = mapper.build("Person", [("full_name", "Ada Lovelace")])?;

    assert_eq!(person.attribute_get("first_name").await?, Value::from("Ada"));
    assert_eq!(person.attribute_get("last_name").await?, Value::from("Lovelace"));
    Ok(())
}

#[tokio::test]
async fn test_attributes_hide_private_readers() -> Result<()> {
    let (mapper, _) = setup(MapperConfig::default())?;
    let person = mapper.build("Person", [("token", "s3cr3t")])?;

    let attributes = person.attributes().await?;
    assert!(!attributes.contains_key("token"));
    assert!(attributes.contains_key("first_name"));
    Ok(())
}

#[tokio::test]
async fn test_update_filters_by_allow_list() -> Result<()> {
    let (mapper, repository) = setup(MapperConfig::default())?;
    let person = mapper.build("Person", [("first_name", "Ada")])?;
    assert!(person.save().await?);
    repository.clear_calls()?;

    let saved = person
        .update(
            [("first_name", Value::from("Grace")), ("age", Value::from(85i64))],
            Some(&["first_name"][..]),
        )
        .await?;

    assert!(saved);
    assert_eq!(person.attribute_get("age").await?, Value::Null);
    assert_eq!(
        repository.calls()?,
        vec![RepositoryCall::Update {
            model: "Person".to_string(),
            changes: Record::from([("first_name".to_string(), Value::from("Grace"))]),
            conditions: vec![Condition::eq("id", 1i64)],
        }]
    );
    Ok(())
}

#[tokio::test]
async fn test_strict_allow_list_rejects_other_names() -> Result<()> {
    let (mapper, repository) = setup(MapperConfig::default().strict_mass_assignment(true))?;
    let person = mapper.build("Person", [("first_name", "Ada")])?;
    assert!(person.save().await?);
    repository.clear_calls()?;

    let err = person
        .update(
            [("first_name", Value::from("Grace")), ("age", Value::from(85i64))],
            Some(&["first_name"][..]),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Naming { setter, .. } if setter == "age"));
    assert_eq!(person.attribute_get("first_name").await?, Value::from("Ada"));
    assert!(repository.calls()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_update_of_new_resource_creates_it() -> Result<()> {
    let (mapper, repository) = setup(MapperConfig::default())?;
    let person = mapper.new_resource("Person")?;

    assert!(person.update([("first_name", "Ada")], None).await?);
    assert!(person.is_saved()?);
    assert_eq!(repository.rows("people").await.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_clearing_unloaded_lazy_attribute_is_written() -> Result<()> {
    let (mapper, repository) = setup(MapperConfig::default())?;
    stored_article(&repository).await;
    let article = find_article(&mapper).await?;

    article.attribute_set("body", Value::Null)?;
    assert!(article.is_attribute_dirty("body")?);
    assert!(article.save().await?);

    let rows = repository.rows("articles").await;
    assert_eq!(rows[0].get("body"), Some(&Value::Null));
    assert_eq!(rows[0].get("summary"), Some(&Value::from("Borrowing")));
    assert!(!article.is_dirty()?);
    Ok(())
}

#[tokio::test]
async fn test_writing_back_stored_lazy_value_is_clean() -> Result<()> {
    let (mapper, repository) = setup(MapperConfig::default())?;
    stored_article(&repository).await;
    let article = find_article(&mapper).await?;
    repository.clear_calls()?;

    article.attribute_write("notes", "Lifetimes").await?;
    assert!(!article.is_dirty()?);

    assert!(article.update([("body", "Ownership")], None).await?);
    let calls = repository.calls()?;
    assert!(!calls.iter().any(|call| matches!(call, RepositoryCall::Update { .. })));
    assert_eq!(
        read_fields(&calls),
        vec![
            vec!["notes".to_string()],
            vec!["body".to_string(), "summary".to_string()],
        ]
    );
    Ok(())
}
