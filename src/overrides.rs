//! Human-name override tables (CSV, keyed by intermediate name or by
//! parameter token) and the merge passes that resolve a parsed forest
//! against them.

use anyhow::{Context, Result, bail};
use std::collections::{BTreeMap, HashMap};

use crate::model::{Class, Parameter, Side, normalize_description};
use crate::parse;

/// Override row for a field or method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRow {
    pub name: String,
    pub description: Option<String>,
    pub side: Side,
}

/// Override row for one parameter position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamRow {
    /// The full key token (`p_70071_2_`), kept as the parameter's
    /// intermediate name.
    pub token: String,
    pub name: String,
    pub description: Option<String>,
    pub side: Side,
}

/// Parameter rows grouped by method id, ordered by parameter index.
pub type ParamTable = HashMap<String, BTreeMap<u32, ParamRow>>;

#[derive(Debug, Default)]
pub struct OverrideTables {
    pub fields: HashMap<String, MemberRow>,
    pub methods: HashMap<String, MemberRow>,
    pub params: ParamTable,
    pub constructor_params: ParamTable,
}

impl OverrideTables {
    pub fn parse(fields_csv: &str, methods_csv: &str, params_csv: &str) -> Result<Self> {
        let fields = parse_member_table(fields_csv).context("fields table")?;
        let methods = parse_member_table(methods_csv).context("methods table")?;
        let (params, constructor_params) =
            parse_param_tables(params_csv).context("params table")?;
        Ok(Self {
            fields,
            methods,
            params,
            constructor_params,
        })
    }
}

struct Header {
    key: usize,
    name: usize,
    side: usize,
    description: Option<usize>,
}

fn parse_header(line: &str, key_column: &str) -> Result<Header> {
    let columns = split_csv_line(line);
    let find = |name: &str| columns.iter().position(|c| c == name);
    let key = find(key_column).with_context(|| format!("missing {key_column:?} column"))?;
    let name = find("name").context("missing \"name\" column")?;
    let side = find("side").context("missing \"side\" column")?;
    let description = find("desc").or_else(|| find("description"));
    Ok(Header {
        key,
        name,
        side,
        description,
    })
}

fn row_side(columns: &[String], header: &Header, row: usize) -> Result<Side> {
    let raw = columns
        .get(header.side)
        .with_context(|| format!("row {row}: missing side column"))?;
    let code: i64 = raw
        .parse()
        .with_context(|| format!("row {row}: invalid side code {raw:?}"))?;
    Side::from_code(code).with_context(|| format!("row {row}"))
}

fn row_description(columns: &[String], header: &Header) -> Option<String> {
    let idx = header.description?;
    normalize_description(columns.get(idx).cloned())
}

/// Table keyed by intermediate name (`searge` column).
pub fn parse_member_table(csv: &str) -> Result<HashMap<String, MemberRow>> {
    let mut lines = csv.lines();
    let header_line = lines.next().context("empty table")?;
    let header = parse_header(header_line, "searge")?;

    let mut rows = HashMap::new();
    for (idx, line) in lines.enumerate() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let columns = split_csv_line(line);
        let row = idx + 2;
        let key = columns
            .get(header.key)
            .filter(|k| !k.is_empty())
            .with_context(|| format!("row {row}: missing key column"))?
            .clone();
        let name = columns
            .get(header.name)
            .with_context(|| format!("row {row}: missing name column"))?
            .clone();
        rows.insert(
            key,
            MemberRow {
                name,
                description: row_description(&columns, &header),
                side: row_side(&columns, &header, row)?,
            },
        );
    }
    Ok(rows)
}

/// Table keyed by parameter token (`param` column). Tokens are classified by
/// shape: plain `p_<id>_<n>_` rows land in the method table, `p_i<id>_<n>_`
/// rows in the constructor table; tokens matching neither are skipped.
pub fn parse_param_tables(csv: &str) -> Result<(ParamTable, ParamTable)> {
    let mut lines = csv.lines();
    let header_line = lines.next().context("empty table")?;
    let header = parse_header(header_line, "param")?;

    let mut params: ParamTable = HashMap::new();
    let mut constructor_params: ParamTable = HashMap::new();
    for (idx, line) in lines.enumerate() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let columns = split_csv_line(line);
        let row = idx + 2;
        let token = columns
            .get(header.key)
            .filter(|k| !k.is_empty())
            .with_context(|| format!("row {row}: missing key column"))?
            .clone();
        let name = columns
            .get(header.name)
            .with_context(|| format!("row {row}: missing name column"))?
            .clone();
        let param_row = ParamRow {
            token: token.clone(),
            name,
            description: row_description(&columns, &header),
            side: row_side(&columns, &header, row)?,
        };
        if let Some((id, index)) = parse::param_key(&token) {
            params
                .entry(id.to_string())
                .or_default()
                .insert(index, param_row);
        } else if let Some((id, index)) = parse::constructor_param_key(&token) {
            constructor_params
                .entry(id.to_string())
                .or_default()
                .insert(index, param_row);
        }
    }
    Ok((params, constructor_params))
}

fn split_csv_line(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    quoted = false;
                }
            }
            '"' => quoted = true,
            ',' if !quoted => out.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    out.push(current);
    out
}

fn apply_member_row(
    name: &mut Option<String>,
    description: &mut Option<String>,
    side: &mut Side,
    row: &MemberRow,
) {
    *name = Some(row.name.clone());
    *description = row.description.clone();
    *side = row.side;
}

fn parameter_from_row(row: &ParamRow) -> Parameter {
    Parameter {
        original_name: None,
        intermediate_name: row.token.clone(),
        name: Some(row.name.clone()),
        description: row.description.clone(),
        side: row.side,
    }
}

/// Tracks which intermediate name claimed each numeric id. Two distinct names
/// colliding on one id would silently miscombine parameters, so it is a hard
/// ingestion error instead.
#[derive(Default)]
struct IdClaims {
    claims: HashMap<String, String>,
}

impl IdClaims {
    fn claim(&mut self, id: &str, intermediate_name: &str) -> Result<()> {
        match self.claims.get(id) {
            None => {
                self.claims
                    .insert(id.to_string(), intermediate_name.to_string());
                Ok(())
            }
            Some(existing) if existing == intermediate_name => Ok(()),
            Some(existing) => bail!(
                "method id {id} claimed by both {existing:?} and {intermediate_name:?}"
            ),
        }
    }
}

/// Resolve a freshly parsed forest against the override tables: populate
/// names, descriptions and sides, attach parameters in index order.
pub fn merge(classes: &mut [Class], tables: &OverrideTables) -> Result<()> {
    let mut method_ids = IdClaims::default();
    let mut constructor_ids = IdClaims::default();
    for class in classes.iter_mut() {
        merge_class(class, tables, &mut method_ids, &mut constructor_ids)?;
    }
    Ok(())
}

fn merge_class(
    class: &mut Class,
    tables: &OverrideTables,
    method_ids: &mut IdClaims,
    constructor_ids: &mut IdClaims,
) -> Result<()> {
    for field in &mut class.fields {
        if let Some(row) = tables.fields.get(&field.intermediate_name) {
            apply_member_row(&mut field.name, &mut field.description, &mut field.side, row);
        }
    }
    for method in &mut class.methods {
        if let Some(row) = tables.methods.get(&method.intermediate_name) {
            apply_member_row(
                &mut method.name,
                &mut method.description,
                &mut method.side,
                row,
            );
        }
        if let Some(id) = parse::method_id(&method.intermediate_name) {
            method_ids.claim(id, &method.intermediate_name)?;
            if let Some(rows) = tables.params.get(id) {
                method
                    .parameters
                    .extend(rows.values().map(parameter_from_row));
            }
        }
    }
    for constructor in &mut class.constructors {
        // The constructor's intermediate name is its numeric id.
        let id = constructor.intermediate_name.clone();
        constructor_ids.claim(&id, &constructor.intermediate_name)?;
        if let Some(rows) = tables.constructor_params.get(&id) {
            constructor
                .parameters
                .extend(rows.values().map(parameter_from_row));
        }
    }
    for child in &mut class.child_classes {
        merge_class(child, tables, method_ids, constructor_ids)?;
    }
    Ok(())
}

/// Refresh an already-resolved forest in place: update names, descriptions
/// and sides of leaves the fresh tables still know; never add, remove or
/// reorder leaves. Used by the incremental rebuild path.
pub fn merge_incremental(classes: &mut [Class], tables: &OverrideTables) {
    for class in classes.iter_mut() {
        refresh_class(class, tables);
    }
}

fn refresh_class(class: &mut Class, tables: &OverrideTables) {
    for field in &mut class.fields {
        if let Some(row) = tables.fields.get(&field.intermediate_name) {
            apply_member_row(&mut field.name, &mut field.description, &mut field.side, row);
        }
    }
    for method in &mut class.methods {
        if let Some(row) = tables.methods.get(&method.intermediate_name) {
            apply_member_row(
                &mut method.name,
                &mut method.description,
                &mut method.side,
                row,
            );
        }
        refresh_parameters(&mut method.parameters, tables);
    }
    for constructor in &mut class.constructors {
        refresh_parameters(&mut constructor.parameters, tables);
    }
    for child in &mut class.child_classes {
        refresh_class(child, tables);
    }
}

fn refresh_parameters(parameters: &mut [Parameter], tables: &OverrideTables) {
    for parameter in parameters.iter_mut() {
        let row = if let Some((id, index)) = parse::param_key(&parameter.intermediate_name) {
            tables.params.get(id).and_then(|rows| rows.get(&index))
        } else if let Some((id, index)) =
            parse::constructor_param_key(&parameter.intermediate_name)
        {
            tables
                .constructor_params
                .get(id)
                .and_then(|rows| rows.get(&index))
        } else {
            None
        };
        if let Some(row) = row {
            parameter.name = Some(row.name.clone());
            parameter.description = row.description.clone();
            parameter.side = row.side;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::FormatGeneration;

    const FIELDS_CSV: &str = "searge,name,side,desc\n\
                              field_70170_p,world,0,\"The world, remotely\"\n";
    const METHODS_CSV: &str = "searge,name,side,desc\n\
                               func_70071_h_,onUpdate,2,Called every tick\n";
    const PARAMS_CSV: &str = "param,name,side\n\
                              p_70071_2_,delta,2\n\
                              p_70071_1_,partialTicks,2\n\
                              p_i1964_1_,mapItem,2\n";

    fn tables() -> OverrideTables {
        OverrideTables::parse(FIELDS_CSV, METHODS_CSV, PARAMS_CSV).unwrap()
    }

    fn parsed_forest() -> Vec<Class> {
        let export = "a net/minecraft/Foo\n\
                      \tb field_70170_p\n\
                      \tc field_70999_z\n\
                      \td (F)V func_70071_h_\n";
        let constructors = "1964 net/minecraft/Foo (Lnet/minecraft/Bar;)V\n";
        parse::parse(FormatGeneration::Tsrg, export, "", Some(constructors)).unwrap()
    }

    #[test]
    fn csv_splitter_honors_quotes() {
        assert_eq!(
            split_csv_line("a,\"b, c\",\"d\"\"e\"\",f"),
            vec!["a", "b, c", "d\"e\",f"]
        );
    }

    #[test]
    fn merge_populates_overridden_leaves_and_defaults_the_rest() {
        let mut classes = parsed_forest();
        merge(&mut classes, &tables()).unwrap();

        let class = &classes[0];
        let world = &class.fields[0];
        assert_eq!(world.name.as_deref(), Some("world"));
        assert_eq!(world.description.as_deref(), Some("The world, remotely"));
        assert_eq!(world.side, Side::Client);

        let unmapped = &class.fields[1];
        assert_eq!(unmapped.name, None);
        assert_eq!(unmapped.description, None);
        assert_eq!(unmapped.side, Side::Both);

        let method = &class.methods[0];
        assert_eq!(method.name.as_deref(), Some("onUpdate"));
        assert_eq!(method.side, Side::Both);
    }

    #[test]
    fn parameters_attach_by_id_in_index_order() {
        let mut classes = parsed_forest();
        merge(&mut classes, &tables()).unwrap();

        let method = &classes[0].methods[0];
        assert_eq!(method.parameters.len(), 2);
        assert_eq!(method.parameters[0].intermediate_name, "p_70071_1_");
        assert_eq!(method.parameters[0].name.as_deref(), Some("partialTicks"));
        assert_eq!(method.parameters[1].intermediate_name, "p_70071_2_");
        assert_eq!(method.parameters[1].side, Side::Both);

        let constructor = &classes[0].constructors[0];
        assert_eq!(constructor.parameters.len(), 1);
        assert_eq!(constructor.parameters[0].intermediate_name, "p_i1964_1_");
        assert_eq!(constructor.parameters[0].name.as_deref(), Some("mapItem"));
    }

    #[test]
    fn colliding_method_ids_abort_the_merge() {
        let export = "a net/minecraft/Foo\n\
                      \tb (F)V func_70071_h_\n\
                      \tc (I)V func_70071_x_\n";
        let mut classes = parse::parse(FormatGeneration::Tsrg, export, "", None).unwrap();
        let err = merge(&mut classes, &tables()).unwrap_err();
        assert!(err.to_string().contains("claimed by both"), "{err}");
    }

    #[test]
    fn incremental_refresh_updates_in_place_without_new_leaves() {
        let mut classes = parsed_forest();
        merge(&mut classes, &tables()).unwrap();
        let before = classes.clone();

        let fresh_fields = "searge,name,side,desc\n\
                            field_70170_p,level,0,Renamed\n";
        let fresh = OverrideTables::parse(fresh_fields, METHODS_CSV, PARAMS_CSV).unwrap();
        merge_incremental(&mut classes, &fresh);

        let field = &classes[0].fields[0];
        assert_eq!(field.name.as_deref(), Some("level"));
        assert_eq!(field.description.as_deref(), Some("Renamed"));

        // Everything else is untouched, leaf counts included.
        let mut expected = before;
        expected[0].fields[0].name = Some("level".to_string());
        expected[0].fields[0].description = Some("Renamed".to_string());
        assert_eq!(classes, expected);
    }

    #[test]
    fn rows_without_overrides_leave_legacy_values() {
        let mut classes = parsed_forest();
        merge(&mut classes, &tables()).unwrap();

        // A table that lost every row must not erase existing names.
        let empty = OverrideTables::parse(
            "searge,name,side,desc\n",
            "searge,name,side,desc\n",
            "param,name,side\n",
        )
        .unwrap();
        let before = classes.clone();
        merge_incremental(&mut classes, &empty);
        assert_eq!(classes, before);
    }

    #[test]
    fn invalid_side_codes_are_table_errors() {
        let bad = "searge,name,side,desc\nfield_1,a,7,\n";
        assert!(parse_member_table(bad).is_err());
    }
}
