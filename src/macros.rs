/// Defines a method to query the database using SurrealQL.
///
/// # Syntax
/// ```text
/// [Base Type] > method_name(...arguments) > [Output Type] where "sql query"
/// ```
/// Where the `Base Type` is the type that the method is being defined for and the `Output Type` is the type that the method will return.
/// Every argument is bound to the query under its own name.
///
/// # Example
///
/// ```ignore
/// define_query! {
///     CountryCounter > find(code: String) > Option<CountryCounter>
///         where "SELECT * FROM clicks WHERE country_code = $code"
/// }
///
/// let counter = CountryCounter::find("US".into(), &db).await?;
/// ```
#[macro_export]
macro_rules! define_query {
    ($model:ty > $relation:ident ($($binding:ident : $binding_type:ty),*) > $export:ty where $query:literal) => {
        impl $model {
            #[tracing::instrument(skip(db))]
            pub async fn $relation($($binding : $binding_type ,)* db: &$crate::database::Database) -> $crate::database::Result<$export> {
                db.sql($query)
                    $(.bind((stringify!($binding), $binding)))*
                    .fetch::<$export>()
                    .await
            }
        }
    };
}
