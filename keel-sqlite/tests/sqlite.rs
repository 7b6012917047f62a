#[cfg(test)]
mod tests {
    use keel::{Connection, Database, Driver};
    use keel_sqlite::{Location, SqliteConnection, SqliteDriver};
    use keel_tests::{execute_tests, init_logs, silent_logs};
    use std::{fs, path::Path, sync::Mutex};

    static MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn sqlite_memory() {
        init_logs();
        let connection = SqliteConnection::new(Location::Memory);
        assert!(!connection.is_open());
        execute_tests(connection);
    }

    #[test]
    fn sqlite_file() {
        init_logs();
        const DB_PATH: &str = "../target/debug/tests.sqlite";
        let _guard = MUTEX.lock().unwrap();
        if Path::new(DB_PATH).exists() {
            fs::remove_file(DB_PATH).unwrap_or_else(|_| {
                panic!("Failed to remove existing test database file {}", DB_PATH)
            });
        }
        fs::create_dir_all("../target/debug").expect("Failed to create the target directory");
        assert!(
            !Path::new(DB_PATH).exists(),
            "Database file should not exist before test"
        );
        let driver = SqliteDriver::new();
        let connection = driver
            .connect(&format!("sqlite://{}?mode=rwc", DB_PATH))
            .expect("Could not open the database");
        assert!(connection.is_open());
        assert!(
            Path::new(DB_PATH).exists(),
            "Database file should be created after connection"
        );
        execute_tests(connection);
    }

    #[test]
    fn create_database() {
        init_logs();
        const DB_PATH: &str = "../target/debug/creation.sqlite";
        let _guard = MUTEX.lock().unwrap();
        fs::create_dir_all("../target/debug").expect("Failed to create the target directory");
        if Path::new(DB_PATH).exists() {
            fs::remove_file(DB_PATH)
                .unwrap_or_else(|_| panic!("Failed to remove test database file {}", DB_PATH));
        }
        Database::<SqliteConnection>::connect(
            &SqliteDriver::new(),
            &format!("sqlite://{}?mode=rwc", DB_PATH),
        )
        .expect("Could not open the database");
        assert!(
            Path::new(DB_PATH).exists(),
            "Database file should be created after connection"
        );
        SqliteDriver::new()
            .connect(&format!("sqlite://{}?mode=ro", DB_PATH))
            .expect("Could not open the database");
        fs::remove_file(DB_PATH)
            .unwrap_or_else(|_| panic!("Failed to remove existing test database file {}", DB_PATH));
        silent_logs! {
            assert!(
                SqliteDriver::new()
                    .connect(&format!("sqlite://{}?mode=ro", DB_PATH))
                    .is_err(),
                "Should not be able to open in read only unexisting database"
            );
        }
    }

    #[test]
    fn wrong_url() {
        silent_logs! {
            assert!(SqliteDriver::new().connect("duckdb://some_value").is_err());
            assert!(SqliteDriver::new().connect("sqlite://db.sqlite?mode=rwx").is_err());
        };
    }
}
