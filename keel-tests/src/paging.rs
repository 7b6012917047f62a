use keel::{Connection, Database, Entity, Operator, Predicate, PredicateGroup, Sort};
use rust_decimal::Decimal;
use std::sync::Mutex;

#[derive(Entity, Debug, Clone, PartialEq)]
struct Product {
    id: i64,
    name: String,
    price: f64,
    category: Option<String>,
    stock: i32,
    reorder: i32,
}

#[derive(Entity, Debug, Clone, PartialEq)]
struct Invoice {
    id: i64,
    number: String,
    total: Decimal,
}

static MUTEX: Mutex<()> = Mutex::new(());

fn setup<C: Connection>(database: &mut Database<C>) -> Vec<Product> {
    database
        .drop_table::<Product>(true)
        .expect("Failed to drop Product table");
    database
        .create_table::<Product>(false)
        .expect("Failed to create Product table");
    let mut products = (1..=10)
        .map(|i| Product {
            id: 0,
            name: format!("p{:02}", i),
            price: i as f64 * 1.5,
            category: match i {
                _ if i % 3 == 0 => None,
                _ if i % 2 == 0 => Some("even".into()),
                _ => Some("odd".into()),
            },
            stock: i * 10,
            reorder: 50,
        })
        .collect::<Vec<_>>();
    let inserted = database
        .insert_many(&mut products, None)
        .expect("Failed to insert the products");
    assert_eq!(inserted, 10);
    assert!(products.windows(2).all(|v| v[0].id < v[1].id));
    products
}

fn names(products: Vec<Product>) -> Vec<String> {
    products.into_iter().map(|v| v.name).collect()
}

pub fn paging<C: Connection>(database: &mut Database<C>) {
    let _lock = MUTEX.lock().unwrap();
    let products = setup(database);
    let by_name = [Sort::asc("name")];

    // Pages
    let page = database
        .get_page::<Product>(None, &by_name, 1, 3, None)
        .expect("Failed to get page 1");
    assert_eq!(names(page), ["p01", "p02", "p03"]);
    let page = database
        .get_page::<Product>(None, &by_name, 2, 3, None)
        .expect("Failed to get page 2");
    assert_eq!(names(page), ["p04", "p05", "p06"]);
    let page = database
        .get_page::<Product>(None, &by_name, 4, 3, None)
        .expect("Failed to get page 4");
    assert_eq!(names(page), ["p10"]);
    let page = database
        .get_page::<Product>(None, &by_name, 5, 3, None)
        .expect("Failed to get page 5");
    assert!(page.is_empty());

    // Page zero is every row
    let page = database
        .get_page::<Product>(None, &by_name, 0, 3, None)
        .expect("Failed to get page 0");
    assert_eq!(page.len(), 10);

    // Without sorts, pages follow the key
    let page = database
        .get_page::<Product>(None, &[], 3, 2, None)
        .expect("Failed to get an unsorted page");
    assert_eq!(page, products[4..6]);

    // Sets
    let set = database
        .get_set::<Product>(None, &[Sort::desc("price")], 2, 3, None)
        .expect("Failed to get a set");
    assert_eq!(names(set), ["p08", "p07", "p06"]);
    let set = database
        .get_set::<Product>(None, &by_name, 8, 0, None)
        .expect("Failed to get an unbounded set");
    assert_eq!(names(set), ["p09", "p10"]);
    let set = database
        .get_set::<Product>(None, &by_name, 0, 0, None)
        .expect("Failed to get every row");
    assert_eq!(set.len(), 10);

    // Filtered pages
    let even = Predicate::eq("category", "even");
    let page = database
        .get_page::<Product>(Some(&even), &[Sort::desc("stock")], 1, 3, None)
        .expect("Failed to get a filtered page");
    assert_eq!(names(page), ["p10", "p08", "p04"]);
    assert_eq!(
        database
            .count::<Product>(Some(&even), None)
            .expect("Failed to count"),
        4
    );
}

pub fn filters<C: Connection>(database: &mut Database<C>) {
    let _lock = MUTEX.lock().unwrap();
    setup(database);
    let mut count = |predicate: Predicate| {
        database
            .count::<Product>(Some(&predicate), None)
            .unwrap_or_else(|e| panic!("Failed to count {:?}: {:#}", predicate, e))
    };

    assert_eq!(count(Predicate::is_null("category")), 3);
    assert_eq!(count(Predicate::is_not_null("category")), 7);
    assert_eq!(count(Predicate::eq("category", "even")), 4);
    // NULL never compares, so negations skip the rows without a category
    assert_eq!(count(Predicate::eq("category", "odd").not()), 4);
    assert_eq!(count(Predicate::is_in("name", ["p01", "p05", "p42"])), 2);
    assert_eq!(count(Predicate::is_in("name", ["p01", "p05"]).not()), 8);
    assert_eq!(count(Predicate::between("stock", 30, 60)), 4);
    assert_eq!(count(Predicate::between("stock", 30, 60).not()), 6);
    assert_eq!(count(Predicate::like("name", "p0%")), 9);
    assert_eq!(count(Predicate::gt("price", 12.0)), 2);
    assert_eq!(count(Predicate::le("price", 3.0)), 2);
    assert_eq!(count(Predicate::ne("stock", 10)), 9);
    assert_eq!(
        count(Predicate::eq("category", "odd").or(Predicate::is_null("category"))),
        6
    );
    assert_eq!(
        count(
            Predicate::eq("category", "even")
                .and(Predicate::ge("stock", 40))
                .and(Predicate::lt("stock", 100))
        ),
        2
    );
    assert_eq!(
        count(
            Predicate::eq("category", "odd")
                .or(Predicate::is_null("category"))
                .not()
        ),
        4
    );
    assert_eq!(count(Predicate::compare("stock", Operator::Gt, "reorder")), 5);
    assert_eq!(
        count(Predicate::compare("stock", Operator::Eq, "reorder").not()),
        9
    );
    assert_eq!(count(Predicate::Group(PredicateGroup::all(Vec::new()))), 10);
    assert_eq!(count(Predicate::Group(PredicateGroup::any(Vec::new()))), 0);
}

pub fn decimals<C: Connection>(database: &mut Database<C>) {
    let _lock = MUTEX.lock().unwrap();
    database
        .drop_table::<Invoice>(true)
        .expect("Failed to drop Invoice table");
    database
        .create_table::<Invoice>(false)
        .expect("Failed to create Invoice table");
    let mut invoices = [
        ("b", Decimal::new(1050, 2)),
        ("c", Decimal::new(800, 2)),
        ("a", Decimal::from(100)),
    ]
    .into_iter()
    .map(|(number, total)| Invoice {
        id: 0,
        number: number.into(),
        total,
    })
    .collect::<Vec<_>>();
    database
        .insert_many(&mut invoices, None)
        .expect("Failed to insert the invoices");

    let mut count = |predicate: Predicate| {
        database
            .count::<Invoice>(Some(&predicate), None)
            .unwrap_or_else(|e| panic!("Failed to count {:?}: {:#}", predicate, e))
    };
    assert_eq!(count(Predicate::gt("total", Decimal::from(9))), 2);
    assert_eq!(count(Predicate::lt("total", Decimal::new(1000, 2))), 1);
    assert_eq!(
        count(Predicate::between("total", Decimal::from(8), Decimal::new(105, 1))),
        2
    );
    assert_eq!(count(Predicate::eq("total", Decimal::new(10000, 2))), 1);

    let sorted = database
        .get_list::<Invoice>(None, &[Sort::asc("total")], None)
        .expect("Failed to list the invoices");
    assert_eq!(
        sorted.iter().map(|v| v.number.as_str()).collect::<Vec<_>>(),
        ["c", "b", "a"]
    );
    assert_eq!(
        sorted.iter().map(|v| v.total).collect::<Vec<_>>(),
        [Decimal::from(8), Decimal::new(105, 1), Decimal::from(100)]
    );
}
