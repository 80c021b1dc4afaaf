//! Code generation for the `StorageType` derive
//!
//! Table SQL is computed at expansion time. The generated type mapping uses
//! the default closure-based resolvers from store_object.

use proc_macro2::TokenStream;
use quote::quote;
use syn::Ident;
use type_mapping::rust_type_to_sqlite_type;

use crate::parsing::{ColumnInfo, TableInfo};

/// Names are validated during parsing
fn quoted(name: &str) -> String {
    format!("\"{}\"", name)
}

pub fn create_table_sql(table_info: &TableInfo, columns: &[ColumnInfo]) -> String {
    let definitions: Vec<String> = columns
        .iter()
        .map(|column| {
            let sql_type = rust_type_to_sqlite_type(&column.rust_type);
            if column.key {
                format!("{} {} PRIMARY KEY", quoted(&column.name), sql_type)
            } else if column.optional {
                format!("{} {}", quoted(&column.name), sql_type)
            } else {
                format!("{} {} NOT NULL", quoted(&column.name), sql_type)
            }
        })
        .collect();

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quoted(&table_info.name),
        definitions.join(", ")
    )
}

pub fn generate_storage_type_impl(name: &Ident, table_info: &TableInfo, columns: &[ColumnInfo]) -> TokenStream {
    let table_name = &table_info.name;
    let create_sql = create_table_sql(table_info, columns);
    let column_names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();

    let Some(key) = columns.iter().find(|c| c.key) else {
        return quote! {
            compile_error!("StorageType requires one field marked #[column(key)]");
        };
    };
    let key_field = &key.field;
    let key_predicate = format!("{} = ?", quoted(&key.name));

    let put_values = columns.iter().map(|column| {
        let field = &column.field;
        let column_name = &column.name;
        if column.ignore_null {
            quote! {
                if let Some(value) = &object.#field {
                    values.put(#column_name, store_object::ToColumnValue::to_column_value(value));
                }
            }
        } else {
            quote! {
                values.put(#column_name, store_object::ToColumnValue::to_column_value(&object.#field));
            }
        }
    });

    let get_fields = columns.iter().map(|column| {
        let field = &column.field;
        let ty = &column.ty;
        let column_name = &column.name;
        quote! {
            #field: row.get_as::<#ty>(#column_name)?
        }
    });

    quote! {
        impl store_object::StorageType for #name {
            fn table_name() -> &'static str {
                #table_name
            }

            fn column_names() -> &'static [&'static str] {
                &[#(#column_names),*]
            }

            fn create_table_sql() -> String {
                #create_sql.to_string()
            }

            fn type_mapping() -> store_object::TypeMapping<Self> {
                store_object::TypeMapping::new(
                    store_object::DefaultPutResolver::new(
                        |_: &Self| Ok(store_object::InsertQuery::builder().table(#table_name).build()?),
                        |object: &Self| {
                            Ok(store_object::UpdateQuery::builder()
                                .table(#table_name)
                                .where_clause(#key_predicate)
                                .where_args([store_object::ToColumnValue::to_column_value(&object.#key_field)])
                                .build()?)
                        },
                        |object: &Self| {
                            let mut values = store_object::ContentValues::new();
                            #(#put_values)*
                            Ok(values)
                        },
                    ),
                    store_object::DefaultGetResolver::new(|row: &store_object::Row| {
                        Ok(Self {
                            #(#get_fields),*
                        })
                    }),
                    store_object::DefaultDeleteResolver::new(|object: &Self| {
                        Ok(store_object::DeleteQuery::builder()
                            .table(#table_name)
                            .where_clause(#key_predicate)
                            .where_args([store_object::ToColumnValue::to_column_value(&object.#key_field)])
                            .build()?)
                    }),
                )
            }
        }
    }
}
