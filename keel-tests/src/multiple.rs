use keel::{Connection, Database, DbError, Entity, MultiplePredicate, Predicate, Sort, db_error};
use std::sync::Mutex;

#[derive(Entity, Debug, Clone, PartialEq)]
struct Team {
    id: i64,
    name: String,
}

#[derive(Entity, Debug, Clone, PartialEq)]
struct Player {
    id: i64,
    team_id: i64,
    name: String,
    number: u8,
}

static MUTEX: Mutex<()> = Mutex::new(());

pub fn multiple<C: Connection>(database: &mut Database<C>) {
    let _lock = MUTEX.lock().unwrap();

    // Setup
    database
        .drop_table::<Team>(true)
        .expect("Failed to drop Team table");
    database
        .create_table::<Team>(false)
        .expect("Failed to create Team table");
    database
        .drop_table::<Player>(true)
        .expect("Failed to drop Player table");
    database
        .create_table::<Player>(false)
        .expect("Failed to create Player table");
    let mut teams = ["Otters", "Herons"].map(|name| Team {
        id: 0,
        name: name.into(),
    });
    database
        .insert_many(&mut teams, None)
        .expect("Failed to insert the teams");
    let mut players = [
        (teams[0].id, "Zoe", 9),
        (teams[0].id, "Abe", 4),
        (teams[1].id, "Kim", 7),
    ]
    .map(|(team_id, name, number)| Player {
        id: 0,
        team_id,
        name: name.into(),
        number,
    });
    database
        .insert_many(&mut players, None)
        .expect("Failed to insert the players");

    // Read in declaration order
    let queries = MultiplePredicate::new()
        .add::<Team>(None, vec![Sort::asc("name")])
        .add::<Player>(
            Some(Predicate::eq("team_id", teams[0].id)),
            vec![Sort::asc("name")],
        )
        .add::<Team>(Some(Predicate::eq("name", "Falcons")), vec![]);
    {
        let mut reader = database
            .get_multiple(&queries, None)
            .expect("Failed to start the multiple query");
        assert_eq!(reader.remaining(), 3);
        let read = reader.read::<Team>().expect("Failed to read the teams");
        assert_eq!(
            read.iter().map(|v| v.name.as_str()).collect::<Vec<_>>(),
            ["Herons", "Otters"]
        );

        // A type mismatch does not consume the position
        let error = reader
            .read::<Team>()
            .expect_err("Players cannot be read as teams");
        assert!(matches!(db_error(&error), Some(DbError::MultipleResult(..))));
        assert_eq!(reader.remaining(), 2);

        let read = reader.read::<Player>().expect("Failed to read the players");
        assert_eq!(read, [players[1].clone(), players[0].clone()]);
        let read = reader.read::<Team>().expect("Failed to read the last set");
        assert!(read.is_empty());
        assert!(reader.is_finished());

        let error = reader
            .read::<Team>()
            .expect_err("Reading past the end must fail");
        assert!(matches!(db_error(&error), Some(DbError::MultipleResult(..))));
    }

    // Invalid queries fail before anything is read
    let queries = MultiplePredicate::new()
        .add::<Team>(None, vec![])
        .add::<Player>(None, vec![Sort::asc("shirt")]);
    let error = database
        .get_multiple(&queries, None)
        .err()
        .expect("Unknown sort properties must be rejected");
    assert!(matches!(db_error(&error), Some(DbError::Mapping { .. })));
}
