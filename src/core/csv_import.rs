use crate::core::title::clean_title;
use crate::domain::model::{Exercise, MuscleGroup, Routine, RoutineExercise};
use crate::utils::error::{FitCheckError, Result};
use serde::Deserialize;
use std::collections::HashSet;

#[derive(Debug, Deserialize)]
struct ExerciseRow {
    #[serde(rename = "Title", default)]
    title: String,
    #[serde(rename = "Desc", default)]
    description: String,
    #[serde(rename = "Type", default)]
    kind: String,
    #[serde(rename = "BodyPart", default)]
    body_part: String,
    #[serde(rename = "Equipment", default)]
    equipment: String,
    #[serde(rename = "Level", default)]
    level: String,
    #[serde(rename = "Rating", default)]
    rating: String,
    #[serde(rename = "RatingDesc", default)]
    rating_description: String,
}

#[derive(Debug, Deserialize)]
struct RoutineRow {
    #[serde(rename = "Routine", default)]
    routine: String,
    #[serde(rename = "MuscleGroup", default)]
    muscle_group: String,
    #[serde(rename = "Exercise", default)]
    exercise: String,
    #[serde(rename = "Set", default)]
    set: String,
    #[serde(rename = "Reps", default)]
    reps: String,
    #[serde(rename = "Weight", default)]
    weight: String,
}

fn decode(content: &[u8]) -> Result<&str> {
    let text = std::str::from_utf8(content)
        .map_err(|e| FitCheckError::validation(format!("CSV upload is not valid UTF-8: {}", e)))?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text))
}

fn reader(text: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes())
}

/// 解析練習 CSV：清理標題，略過空白或重複的標題
pub fn parse_exercises_csv(content: &[u8]) -> Result<Vec<Exercise>> {
    let text = decode(content)?;
    let mut rdr = reader(text);

    let mut seen_titles = HashSet::new();
    let mut exercises = Vec::new();

    for (index, row) in rdr.deserialize::<ExerciseRow>().enumerate() {
        let row = row?;
        let title = clean_title(&row.title);

        if title.is_empty() || !seen_titles.insert(title.clone()) {
            tracing::debug!("Skipping CSV row {}: empty or duplicate title", index + 1);
            continue;
        }

        let rating_text = row.rating.trim();
        let rating = if rating_text.is_empty() {
            0.0
        } else {
            rating_text.parse::<f64>().map_err(|_| {
                FitCheckError::validation(format!(
                    "Row {}: rating '{}' is not a number",
                    index + 1,
                    rating_text
                ))
            })?
        };

        exercises.push(Exercise {
            title,
            description: row.description.trim().to_string(),
            kind: row.kind.trim().to_string(),
            body_part: row.body_part.trim().to_string(),
            equipment: row.equipment.trim().to_string(),
            level: row.level.trim().to_string(),
            rating,
            rating_description: row.rating_description.trim().to_string(),
            ..Exercise::default()
        });
    }

    tracing::debug!("Parsed {} exercises from CSV", exercises.len());
    Ok(exercises)
}

/// 解析課表 CSV：Routine -> MuscleGroup -> Exercise -> sets，保留首次出現的順序
pub fn parse_routines_csv(content: &[u8]) -> Result<Vec<Routine>> {
    let text = decode(content)?;
    let mut rdr = reader(text);

    let mut routines: Vec<Routine> = Vec::new();

    for row in rdr.deserialize::<RoutineRow>() {
        let row = row?;
        let routine_name = row.routine.trim();
        let group_title = row.muscle_group.trim();
        let exercise_title = row.exercise.trim();

        if routine_name.is_empty() || group_title.is_empty() || exercise_title.is_empty() {
            continue;
        }

        let routine = match routines.iter().position(|r| r.name == routine_name) {
            Some(i) => &mut routines[i],
            None => {
                routines.push(Routine {
                    name: routine_name.to_string(),
                    ..Routine::default()
                });
                let last = routines.len() - 1;
                &mut routines[last]
            }
        };

        let group = match routine.groups.iter().position(|g| g.title == group_title) {
            Some(i) => &mut routine.groups[i],
            None => {
                routine.groups.push(MuscleGroup {
                    title: group_title.to_string(),
                    exercises: Vec::new(),
                });
                let last = routine.groups.len() - 1;
                &mut routine.groups[last]
            }
        };

        let exercise = match group.exercises.iter().position(|e| e.title == exercise_title) {
            Some(i) => &mut group.exercises[i],
            None => {
                group.exercises.push(RoutineExercise {
                    title: exercise_title.to_string(),
                    table: Vec::new(),
                });
                let last = group.exercises.len() - 1;
                &mut group.exercises[last]
            }
        };

        exercise.table.push([
            row.set.trim().to_string(),
            row.reps.trim().to_string(),
            row.weight.trim().to_string(),
        ]);
    }

    tracing::debug!("Parsed {} routines from CSV", routines.len());
    Ok(routines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exercises_dedups_and_cleans() {
        let csv = "Title,Desc,Type,BodyPart,Equipment,Level,Rating,RatingDesc\n\
                   bench press,Chest press, Strength ,Chest,Barbell,Intermediate,8.5,Good\n\
                   bench  PRESS 2,dup,,,,,,\n\
                   1234,digits only,,,,,,\n\
                   Squat,,Strength,Legs,Barbell,Beginner,,\n";

        let exercises = parse_exercises_csv(csv.as_bytes()).unwrap();

        assert_eq!(exercises.len(), 2);
        assert_eq!(exercises[0].title, "Bench Press");
        assert_eq!(exercises[0].kind, "Strength");
        assert_eq!(exercises[0].rating, 8.5);
        assert_eq!(exercises[0].gif_url, "");
        assert!(exercises[0].searched_gifs.is_empty());
        assert_eq!(exercises[1].title, "Squat");
        assert_eq!(exercises[1].rating, 0.0);
    }

    #[test]
    fn test_parse_exercises_missing_columns_default_to_empty() {
        let csv = "Title\nPlank\n";
        let exercises = parse_exercises_csv(csv.as_bytes()).unwrap();
        assert_eq!(exercises.len(), 1);
        assert_eq!(exercises[0].description, "");
        assert_eq!(exercises[0].level, "");
    }

    #[test]
    fn test_parse_exercises_bad_rating() {
        let csv = "Title,Rating\nPlank,great\n";
        let err = parse_exercises_csv(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Row 1"));
    }

    #[test]
    fn test_parse_rejects_non_utf8() {
        let bytes = [0x54, 0x69, 0xff, 0xfe];
        assert!(parse_exercises_csv(&bytes).is_err());
        assert!(parse_routines_csv(&bytes).is_err());
    }

    #[test]
    fn test_parse_routines_groups_in_first_seen_order() {
        let csv = "Routine,MuscleGroup,Exercise,Set,Reps,Weight\n\
                   Push Day,Chest,Bench Press,1,10,60\n\
                   Push Day,Chest,Bench Press,2,8,70\n\
                   Push Day,Shoulders,Overhead Press,1,10,40\n\
                   Leg Day,Legs,Squat,1,5,100\n\
                   Push Day,Chest,Incline Press,1,12,40\n\
                   ,Chest,Orphan,1,1,1\n\
                   Leg Day,,Lunge,1,1,1\n";

        let routines = parse_routines_csv(csv.as_bytes()).unwrap();

        assert_eq!(routines.len(), 2);
        let push = &routines[0];
        assert_eq!(push.name, "Push Day");
        assert_eq!(push.description, "");
        assert_eq!(push.groups.len(), 2);
        assert_eq!(push.groups[0].title, "Chest");
        assert_eq!(push.groups[0].exercises.len(), 2);
        assert_eq!(push.groups[0].exercises[0].title, "Bench Press");
        assert_eq!(
            push.groups[0].exercises[0].table,
            vec![
                ["1".to_string(), "10".to_string(), "60".to_string()],
                ["2".to_string(), "8".to_string(), "70".to_string()],
            ]
        );
        assert_eq!(push.groups[0].exercises[1].title, "Incline Press");
        assert_eq!(push.groups[1].title, "Shoulders");

        let legs = &routines[1];
        assert_eq!(legs.groups.len(), 1);
        assert_eq!(legs.groups[0].exercises[0].title, "Squat");
    }

    #[test]
    fn test_parse_routines_empty_input() {
        let csv = "Routine,MuscleGroup,Exercise,Set,Reps,Weight\n";
        assert!(parse_routines_csv(csv.as_bytes()).unwrap().is_empty());
    }
}
